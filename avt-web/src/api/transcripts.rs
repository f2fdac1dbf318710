//! Transcript rendering and downloads

use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::api::downloads::text_attachment;
use crate::error::{ApiResult, ValidationError};
use crate::models::transcript::parse_transcript_id;
use crate::models::{Segment, Task, Transcript};
use crate::services::{render_srt, render_txt};
use crate::AppState;

/// JSON rendering of a transcript
#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub media_id: String,
    pub transcript_id: String,
    pub text: String,
    pub language: Option<String>,
    pub task: Task,
    pub model: Option<String>,
    pub duration_secs: f64,
    pub segments: Vec<Segment>,
    /// Served from the cache without running the pipeline
    pub cached: bool,
    pub srt_url: String,
    pub txt_url: String,
    pub json_url: String,
}

impl TranscriptResponse {
    pub fn new(transcript: &Transcript, cached: bool) -> Self {
        let base = format!("/api/transcripts/{}", transcript.id);
        Self {
            media_id: transcript.media_id.clone(),
            transcript_id: transcript.id.clone(),
            text: transcript.text.clone(),
            language: transcript.language.clone(),
            task: transcript.options.task,
            model: transcript.options.model.clone(),
            duration_secs: transcript.duration_secs,
            segments: transcript.segments.clone(),
            cached,
            srt_url: format!("{}/subtitles.srt", base),
            txt_url: format!("{}/transcript.txt", base),
            json_url: format!("{}/transcript.json", base),
        }
    }
}

/// Load a cached transcript by id
pub async fn load_transcript(state: &AppState, transcript_id: &str) -> ApiResult<Transcript> {
    parse_transcript_id(transcript_id)?;
    state
        .store
        .load_transcript(transcript_id)
        .await?
        .ok_or_else(|| ValidationError::UnknownTranscript(transcript_id.to_string()).into())
}

/// GET /api/transcripts/:transcript_id/transcript.json
pub async fn get_transcript_json(
    State(state): State<AppState>,
    Path(transcript_id): Path<String>,
) -> ApiResult<Json<TranscriptResponse>> {
    let transcript = load_transcript(&state, &transcript_id).await?;
    Ok(Json(TranscriptResponse::new(&transcript, true)))
}

/// GET /api/transcripts/:transcript_id/subtitles.srt
pub async fn get_subtitles_srt(
    State(state): State<AppState>,
    Path(transcript_id): Path<String>,
) -> ApiResult<Response> {
    let transcript = load_transcript(&state, &transcript_id).await?;
    Ok(text_attachment(
        render_srt(&transcript),
        "application/x-subrip; charset=utf-8",
        "subtitles.srt",
    ))
}

/// GET /api/transcripts/:transcript_id/transcript.txt
pub async fn get_transcript_txt(
    State(state): State<AppState>,
    Path(transcript_id): Path<String>,
) -> ApiResult<Response> {
    let transcript = load_transcript(&state, &transcript_id).await?;
    Ok(text_attachment(
        render_txt(&transcript),
        "text/plain; charset=utf-8",
        "transcript.txt",
    ))
}

/// Build transcript download routes
pub fn transcript_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/transcripts/:transcript_id/transcript.json",
            get(get_transcript_json),
        )
        .route(
            "/api/transcripts/:transcript_id/subtitles.srt",
            get(get_subtitles_srt),
        )
        .route(
            "/api/transcripts/:transcript_id/transcript.txt",
            get(get_transcript_txt),
        )
}
