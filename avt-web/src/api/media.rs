//! Staged media endpoints
//!
//! Upload once, then transcribe, extract MP3 or burn captions against the
//! stored media id as many times as needed.

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::api::downloads::rendered_attachment;
use crate::api::transcripts::{load_transcript, TranscriptResponse};
use crate::error::{ApiResult, ValidationError};
use crate::models::{CaptionStyle, Container, TranscriptionOptions, UploadedMedia};
use crate::services::Retention;
use crate::AppState;

/// Stored upload
#[derive(Debug, Serialize)]
pub struct MediaResponse {
    pub media_id: String,
    pub filename: String,
    pub size_bytes: u64,
    pub container: Container,
    pub declared_type: Option<String>,
    /// Type the media is served and processed as
    pub content_type: String,
    pub transcript_url: String,
    pub mp3_url: String,
    pub captions_url: String,
}

impl From<&UploadedMedia> for MediaResponse {
    fn from(media: &UploadedMedia) -> Self {
        let base = format!("/api/media/{}", media.id);
        Self {
            media_id: media.id.clone(),
            filename: media.filename.clone(),
            size_bytes: media.size_bytes,
            container: media.container,
            declared_type: media.declared_type.clone(),
            content_type: media.container.mime_type().to_string(),
            transcript_url: format!("{}/transcript", base),
            mp3_url: format!("{}/mp3", base),
            captions_url: format!("{}/captions", base),
        }
    }
}

/// Body of POST /api/media/:media_id/captions
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CaptionRequest {
    /// Existing transcript to burn; transcribed with `options` when absent
    pub transcript_id: Option<String>,
    pub options: TranscriptionOptions,
    pub style: CaptionStyle,
}

/// Parse an optional JSON body; an empty body yields the default
fn json_or_default<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ValidationError::InvalidRequest(e.to_string()))
}

/// POST /api/media
///
/// 201 for new content, 200 when identical bytes were already stored.
pub async fn upload_media(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<MediaResponse>)> {
    let multipart = multipart.map_err(|e| ValidationError::InvalidRequest(e.body_text()))?;
    let upload = state
        .ingestion_gate()
        .accept(multipart, Retention::Persistent)
        .await?;

    let status = if upload.newly_stored {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(MediaResponse::from(&upload.media.media))))
}

/// GET /api/media/:media_id
pub async fn get_media(
    State(state): State<AppState>,
    Path(media_id): Path<String>,
) -> ApiResult<Json<MediaResponse>> {
    let media = state.store.load_media(&media_id).await?;
    Ok(Json(MediaResponse::from(&media.media)))
}

/// POST /api/media/:media_id/transcript
///
/// Body: optional JSON `{language, task, model}`.
pub async fn transcribe_media(
    State(state): State<AppState>,
    Path(media_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<TranscriptResponse>> {
    let options = json_or_default::<TranscriptionOptions>(&body)?.validated()?;
    let media = state.store.load_media(&media_id).await?;

    let outcome = state.pipeline().transcribe(&media, options).await?;
    Ok(Json(TranscriptResponse::new(
        &outcome.transcript,
        outcome.cached,
    )))
}

/// POST /api/media/:media_id/mp3
pub async fn extract_mp3(
    State(state): State<AppState>,
    Path(media_id): Path<String>,
) -> ApiResult<Response> {
    let media = state.store.load_media(&media_id).await?;
    let rendered = state.media_actions().extract_mp3(&media).await?;
    rendered_attachment(&rendered, "audio/mpeg", "audio_track.mp3").await
}

/// POST /api/media/:media_id/captions
///
/// Body: JSON `{transcript_id?, options?, style?}`.
pub async fn burn_captions(
    State(state): State<AppState>,
    Path(media_id): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let request = json_or_default::<CaptionRequest>(&body)?;
    request.style.validate()?;
    let media = state.store.load_media(&media_id).await?;

    let transcript = match &request.transcript_id {
        Some(transcript_id) => load_transcript(&state, transcript_id).await?,
        None => {
            let options = request.options.validated()?;
            state.pipeline().transcribe(&media, options).await?.transcript
        }
    };

    let rendered = state
        .media_actions()
        .burn_captions(&media, &transcript, &request.style)
        .await?;
    rendered_attachment(&rendered, "video/mp4", "captioned.mp4").await
}

/// Routes operating on stored media (uploads are routed separately)
pub fn media_routes() -> Router<AppState> {
    Router::new()
        .route("/api/media/:media_id", get(get_media))
        .route("/api/media/:media_id/transcript", post(transcribe_media))
        .route("/api/media/:media_id/mp3", post(extract_mp3))
        .route("/api/media/:media_id/captions", post(burn_captions))
}
