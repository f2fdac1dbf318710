//! Speech-to-text backend client
//!
//! Talks to an OpenAI-compatible Whisper server (`/audio/transcriptions`,
//! `/audio/translations`) and asks for `verbose_json` so segment timings come
//! back with the text.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::TranscriptionBackendConfig;
use crate::error::ProcessingError;
use crate::models::{NormalizedAudio, RawSegment, RawTranscription, Task, TranscriptionOptions};

/// Longest backend error body kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Converts normalized audio into text with segment timings
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Backend name for logs and health output
    fn name(&self) -> &str;

    async fn transcribe(
        &self,
        audio: &NormalizedAudio,
        options: &TranscriptionOptions,
    ) -> Result<RawTranscription, ProcessingError>;
}

#[derive(Debug, Deserialize)]
struct VerboseJsonResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    segments: Vec<VerboseJsonSegment>,
}

#[derive(Debug, Deserialize)]
struct VerboseJsonSegment {
    start: Option<f64>,
    end: Option<f64>,
    #[serde(default)]
    text: String,
}

impl From<VerboseJsonResponse> for RawTranscription {
    fn from(response: VerboseJsonResponse) -> Self {
        RawTranscription {
            text: response.text,
            language: response.language,
            segments: response
                .segments
                .into_iter()
                .map(|s| RawSegment {
                    start: s.start,
                    end: s.end,
                    text: s.text,
                })
                .collect(),
        }
    }
}

/// Client for an OpenAI-compatible transcription server
pub struct WhisperApiTranscriber {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    timeout: Duration,
}

impl WhisperApiTranscriber {
    pub fn new(config: &TranscriptionBackendConfig) -> avt_common::Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("avt-web/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| avt_common::Error::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            default_model: config.model.clone(),
            timeout: config.timeout,
        })
    }

    fn endpoint(&self, task: Task) -> String {
        match task {
            Task::Transcribe => format!("{}/audio/transcriptions", self.base_url),
            Task::Translate => format!("{}/audio/translations", self.base_url),
        }
    }

    fn request_error(&self, err: reqwest::Error) -> ProcessingError {
        if err.is_timeout() {
            ProcessingError::Timeout {
                operation: "Transcription".to_string(),
                seconds: self.timeout.as_secs(),
            }
        } else {
            ProcessingError::TranscriptionUnavailable(err.to_string())
        }
    }
}

#[async_trait]
impl Transcriber for WhisperApiTranscriber {
    fn name(&self) -> &str {
        "whisper-api"
    }

    async fn transcribe(
        &self,
        audio: &NormalizedAudio,
        options: &TranscriptionOptions,
    ) -> Result<RawTranscription, ProcessingError> {
        let wav_bytes = tokio::fs::read(&audio.path)
            .await
            .map_err(|e| ProcessingError::InvalidAudio(format!("{}: {}", audio.path.display(), e)))?;

        let file_part = Part::bytes(wav_bytes)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| ProcessingError::InvalidAudio(e.to_string()))?;

        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", model.clone())
            .text("response_format", "verbose_json");

        // Translation always targets English; the source language is detected
        if options.task == Task::Transcribe {
            if let Some(language) = &options.language {
                form = form.text("language", language.clone());
            }
        }

        let url = self.endpoint(options.task);
        debug!(url = %url, model = %model, media_id = %audio.media_id, "Sending transcription request");

        let mut request = self.http_client.post(&url).multipart(form);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| self.request_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.request_error(e))?;
        if !status.is_success() {
            return Err(ProcessingError::TranscriptionFailed {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let parsed: VerboseJsonResponse = serde_json::from_str(&body)
            .map_err(|e| ProcessingError::InvalidResponse(e.to_string()))?;

        info!(
            media_id = %audio.media_id,
            segments = parsed.segments.len(),
            language = ?parsed.language,
            "Transcription received"
        );
        Ok(parsed.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Multipart;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::path::PathBuf;

    /// Serve `router` on an ephemeral port; returns the `/v1` base URL
    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    fn backend_config(base_url: String) -> TranscriptionBackendConfig {
        TranscriptionBackendConfig {
            base_url,
            api_key: Some("secret".to_string()),
            model: "whisper-1".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    fn audio_in(dir: &std::path::Path) -> NormalizedAudio {
        let path = dir.join("normalized.wav");
        std::fs::write(&path, b"RIFF....WAVE").unwrap();
        NormalizedAudio {
            media_id: "m".to_string(),
            path,
            codec: "pcm_s16le".to_string(),
            sample_rate: 16_000,
            channels: 1,
            duration_secs: 2.0,
        }
    }

    async fn echo_fields(headers: HeaderMap, mut multipart: Multipart) -> Json<Value> {
        let mut fields = serde_json::Map::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap().to_string();
            if name == "file" {
                let file_name = field.file_name().unwrap().to_string();
                fields.insert(name, json!(file_name));
            } else {
                fields.insert(name, json!(field.text().await.unwrap()));
            }
        }
        let auth = headers
            .get("authorization")
            .map(|v| v.to_str().unwrap().to_string());
        Json(json!({
            "text": serde_json::to_string(&fields).unwrap(),
            "language": auth,
            "segments": [
                {"start": 0.0, "end": 1.5, "text": " hello"},
                {"start": 1.5, "end": 2.0, "text": " world"}
            ]
        }))
    }

    #[tokio::test]
    async fn test_transcribe_sends_form_and_parses_segments() {
        let base = spawn_backend(Router::new().route("/v1/audio/transcriptions", post(echo_fields))).await;
        let transcriber = WhisperApiTranscriber::new(&backend_config(base)).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let options = TranscriptionOptions {
            language: Some("en".to_string()),
            task: Task::Transcribe,
            model: None,
        };
        let raw = transcriber.transcribe(&audio_in(dir.path()), &options).await.unwrap();

        let sent: Value = serde_json::from_str(&raw.text).unwrap();
        assert_eq!(sent["file"], "audio.wav");
        assert_eq!(sent["model"], "whisper-1");
        assert_eq!(sent["response_format"], "verbose_json");
        assert_eq!(sent["language"], "en");
        assert_eq!(raw.language.as_deref(), Some("Bearer secret"));
        assert_eq!(raw.segments.len(), 2);
        assert_eq!(raw.segments[0].end, Some(1.5));
    }

    #[tokio::test]
    async fn test_translate_uses_translation_endpoint_without_language() {
        let base = spawn_backend(Router::new().route("/v1/audio/translations", post(echo_fields))).await;
        let transcriber = WhisperApiTranscriber::new(&backend_config(base)).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let options = TranscriptionOptions {
            language: Some("ak".to_string()),
            task: Task::Translate,
            model: Some("large-v3".to_string()),
        };
        let raw = transcriber.transcribe(&audio_in(dir.path()), &options).await.unwrap();

        let sent: Value = serde_json::from_str(&raw.text).unwrap();
        assert_eq!(sent["model"], "large-v3");
        assert!(sent.get("language").is_none());
    }

    #[tokio::test]
    async fn test_backend_error_status_is_reported() {
        let router = Router::new().route(
            "/v1/audio/transcriptions",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model not loaded") }),
        );
        let base = spawn_backend(router).await;
        let transcriber = WhisperApiTranscriber::new(&backend_config(base)).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = transcriber
            .transcribe(&audio_in(dir.path()), &TranscriptionOptions::default())
            .await
            .unwrap_err();
        match err {
            ProcessingError::TranscriptionFailed { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "model not loaded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unparseable_body_is_invalid_response() {
        let router = Router::new().route("/v1/audio/transcriptions", post(|| async { "plain text" }));
        let base = spawn_backend(router).await;
        let transcriber = WhisperApiTranscriber::new(&backend_config(base)).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = transcriber
            .transcribe(&audio_in(dir.path()), &TranscriptionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        // Bind then drop to get a port with nothing listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transcriber =
            WhisperApiTranscriber::new(&backend_config(format!("http://{}/v1", addr))).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = transcriber
            .transcribe(&audio_in(dir.path()), &TranscriptionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::TranscriptionUnavailable(_)));
    }

    #[tokio::test]
    async fn test_missing_audio_file_is_invalid_audio() {
        let transcriber =
            WhisperApiTranscriber::new(&backend_config("http://127.0.0.1:9/v1".to_string())).unwrap();
        let audio = NormalizedAudio {
            media_id: "m".to_string(),
            path: PathBuf::from("/nonexistent/normalized.wav"),
            codec: "pcm_s16le".to_string(),
            sample_rate: 16_000,
            channels: 1,
            duration_secs: 1.0,
        };
        let err = transcriber
            .transcribe(&audio, &TranscriptionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidAudio(_)));
    }
}
