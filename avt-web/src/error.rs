//! Error types for avt-web
//!
//! Three families, matching how failures are surfaced:
//! - configuration errors abort startup (`avt_common::Error::Config`)
//! - [`ValidationError`]: the request itself is unacceptable (4xx)
//! - [`ProcessingError`]: a well-formed request failed in ffmpeg or the
//!   transcription backend (4xx/5xx)
//!
//! Both per-request families render as JSON through [`ApiError`] and never
//! take the server down.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Request rejected before any processing
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Upload exceeds the configured ceiling
    #[error("Upload exceeds the maximum size of {limit_bytes} bytes")]
    TooLarge { limit_bytes: u64 },

    /// File extension is not an accepted video container
    #[error("Unsupported file type: {0} (accepted: mp4, mov, avi, mkv)")]
    UnsupportedType(String),

    /// Multipart body has no `file` field
    #[error("No file was uploaded")]
    MissingFile,

    /// Uploaded file has zero bytes
    #[error("Uploaded file is empty")]
    EmptyFile,

    /// Malformed request body or parameter
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown media: {0}")]
    UnknownMedia(String),

    #[error("Unknown transcript: {0}")]
    UnknownTranscript(String),
}

/// Per-request failure of an external collaborator
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// ffmpeg could not be spawned after startup succeeded
    #[error("Media tool unavailable: {0}")]
    ToolUnavailable(String),

    /// ffmpeg ran but rejected the input (corrupt media, unsupported codec, no audio track)
    #[error("{operation} failed: {detail}")]
    MediaTool { operation: String, detail: String },

    /// ffmpeg output was not the expected WAV stream
    #[error("Invalid normalized audio: {0}")]
    InvalidAudio(String),

    /// Transcription backend could not be reached
    #[error("Transcription backend unavailable: {0}")]
    TranscriptionUnavailable(String),

    /// Transcription backend answered with an error status
    #[error("Transcription backend returned {status}: {body}")]
    TranscriptionFailed { status: u16, body: String },

    /// Transcription backend answered with an unparseable body
    #[error("Invalid transcription response: {0}")]
    InvalidResponse(String),

    /// External call exceeded its time budget
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// avt-common error
    #[error("Common error: {0}")]
    Common(#[from] avt_common::Error),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status and stable machine-readable code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(err) => match err {
                ValidationError::TooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "UPLOAD_TOO_LARGE"),
                ValidationError::UnsupportedType(_) => {
                    (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_TYPE")
                }
                ValidationError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
                ValidationError::EmptyFile => (StatusCode::BAD_REQUEST, "EMPTY_FILE"),
                ValidationError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                ValidationError::UnknownMedia(_) => (StatusCode::NOT_FOUND, "MEDIA_NOT_FOUND"),
                ValidationError::UnknownTranscript(_) => {
                    (StatusCode::NOT_FOUND, "TRANSCRIPT_NOT_FOUND")
                }
            },
            ApiError::Processing(err) => match err {
                ProcessingError::ToolUnavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "MEDIA_TOOL_UNAVAILABLE")
                }
                ProcessingError::MediaTool { .. } | ProcessingError::InvalidAudio(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "MEDIA_PROCESSING_FAILED")
                }
                ProcessingError::TranscriptionUnavailable(_) => {
                    (StatusCode::BAD_GATEWAY, "TRANSCRIPTION_UNAVAILABLE")
                }
                ProcessingError::TranscriptionFailed { .. }
                | ProcessingError::InvalidResponse(_) => {
                    (StatusCode::BAD_GATEWAY, "TRANSCRIPTION_FAILED")
                }
                ProcessingError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            },
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            ApiError::Common(_) => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// True for failures caused by the request rather than the service
    pub fn is_validation(&self) -> bool {
        matches!(self, ApiError::Validation(_))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "Request failed");
        } else {
            tracing::warn!(code = error_code, error = %self, "Request rejected");
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
