//! Upload size enforcement
//!
//! Applied to the upload routes only. A declared `Content-Length` over the
//! ceiling is rejected here, before the body is touched; bodies without a
//! length are cut off by the ingestion gate while streaming.

use axum::{
    extract::{Request, State},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use avt_common::events::PipelineEvent;

use crate::error::{ApiError, ValidationError};
use crate::AppState;

/// Allowance for multipart boundaries, part headers and text fields
pub const MULTIPART_ENVELOPE_BYTES: u64 = 64 * 1024;

/// Largest request body accepted on an upload route
pub fn upload_body_limit(max_upload_bytes: u64) -> u64 {
    max_upload_bytes.saturating_add(MULTIPART_ENVELOPE_BYTES)
}

/// Reject uploads whose declared length exceeds the ceiling
pub async fn upload_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let limit = upload_body_limit(state.config.max_upload_bytes);

    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());

    if let Some(length) = declared {
        if length > limit {
            warn!(
                content_length = length,
                limit_bytes = state.config.max_upload_bytes,
                path = %request.uri().path(),
                "Rejecting oversized upload"
            );
            let err = ValidationError::TooLarge {
                limit_bytes: state.config.max_upload_bytes,
            };
            state.event_bus.emit_lossy(PipelineEvent::MediaRejected {
                reason: err.to_string(),
                timestamp: avt_common::time::now(),
            });
            return Err(err.into());
        }
    }

    Ok(next.run(request).await)
}
