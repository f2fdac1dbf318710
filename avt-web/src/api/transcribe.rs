//! Single-shot transcription endpoint
//!
//! Upload, transcribe and render in one request. The upload is only kept for
//! the duration of the request, or longer if a staged upload of the same
//! content claims it meanwhile; the transcript stays in the cache so its
//! download links keep working.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};

use crate::api::transcripts::TranscriptResponse;
use crate::error::{ApiResult, ValidationError};
use crate::models::TranscriptionOptions;
use crate::services::Retention;
use crate::AppState;

/// POST /api/transcribe
///
/// Multipart fields: `file` (required), `language`, `task`, `model`.
pub async fn transcribe_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<TranscriptResponse>> {
    let multipart = multipart.map_err(|e| ValidationError::InvalidRequest(e.body_text()))?;
    let upload = state
        .ingestion_gate()
        .accept(multipart, Retention::Transient)
        .await?;

    // Dropping `upload` releases the stored media
    let options = TranscriptionOptions::from_fields(&upload.fields)?;
    let outcome = state.pipeline().transcribe(&upload.media, options).await?;
    Ok(Json(TranscriptResponse::new(
        &outcome.transcript,
        outcome.cached,
    )))
}
