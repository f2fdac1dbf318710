//! Shared fixtures for avt-web integration tests
//!
//! Fake media tools stand in for ffmpeg and the transcription backend and
//! count their invocations, so tests can assert what never ran.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Notify;
use tower::ServiceExt;

use avt_common::events::EventBus;
use avt_web::config::ServiceConfig;
use avt_web::error::ProcessingError;
use avt_web::models::{
    NormalizedAudio, RawSegment, RawTranscription, TranscriptionOptions, UploadedMedia,
};
use avt_web::services::ffmpeg::inspect_wav;
use avt_web::services::{MediaRenderer, Normalizer, Transcriber};
use avt_web::{build_router, AppState};

pub const BOUNDARY: &str = "avt-test-boundary";

/// Holds a gated normalizer inside `normalize` until released
#[derive(Clone, Default)]
pub struct NormalizerGate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl NormalizerGate {
    /// Wait until a job is blocked in normalization
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Normalizer writing a silent 16 kHz mono WAV of fixed length
pub struct FakeNormalizer {
    pub calls: AtomicUsize,
    duration_secs: f64,
    fail: bool,
    gate: Option<NormalizerGate>,
}

impl FakeNormalizer {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            duration_secs,
            fail: false,
            gate: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(0.0)
        }
    }

    pub fn gated(duration_secs: f64) -> (Self, NormalizerGate) {
        let gate = NormalizerGate::default();
        let normalizer = Self {
            gate: Some(gate.clone()),
            ..Self::new(duration_secs)
        };
        (normalizer, gate)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Normalizer for FakeNormalizer {
    async fn normalize(
        &self,
        media: &UploadedMedia,
        work_dir: &Path,
    ) -> Result<NormalizedAudio, ProcessingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if !media.path.exists() {
            return Err(ProcessingError::MediaTool {
                operation: "Audio extraction".to_string(),
                detail: format!("{}: No such file or directory", media.path.display()),
            });
        }
        if self.fail {
            return Err(ProcessingError::MediaTool {
                operation: "Audio extraction".to_string(),
                detail: "Invalid data found when processing input".to_string(),
            });
        }

        let path = work_dir.join("normalized.wav");
        write_silent_wav(&path, self.duration_secs);
        inspect_wav(&media.id, path).await
    }
}

/// Write a mono 16 kHz 16-bit WAV of silence
pub fn write_silent_wav(path: &Path, duration_secs: f64) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..(duration_secs * 16_000.0) as usize {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// Transcriber returning canned segments
pub struct FakeTranscriber {
    pub calls: AtomicUsize,
    pub last_options: Mutex<Option<TranscriptionOptions>>,
    fail: bool,
}

impl FakeTranscriber {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            last_options: Mutex::new(None),
            fail: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    fn name(&self) -> &str {
        "fake"
    }

    async fn transcribe(
        &self,
        audio: &NormalizedAudio,
        options: &TranscriptionOptions,
    ) -> Result<RawTranscription, ProcessingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options.clone());
        if self.fail {
            return Err(ProcessingError::TranscriptionUnavailable(
                "connection refused".to_string(),
            ));
        }
        assert!(audio.path.exists(), "normalized audio must exist while transcribing");

        Ok(RawTranscription {
            text: "Hello world. This is a test.".to_string(),
            language: Some("en".to_string()),
            segments: vec![
                RawSegment {
                    start: Some(0.0),
                    end: Some(1.5),
                    text: " Hello world.".to_string(),
                },
                RawSegment {
                    start: Some(1.5),
                    end: Some(3.0),
                    text: " This is a test.".to_string(),
                },
            ],
        })
    }
}

/// Renderer writing marker bytes instead of encoding
pub struct FakeRenderer {
    pub mp3_calls: AtomicUsize,
    pub burn_calls: AtomicUsize,
    pub last_filter: Mutex<Option<String>>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self {
            mp3_calls: AtomicUsize::new(0),
            burn_calls: AtomicUsize::new(0),
            last_filter: Mutex::new(None),
        }
    }
}

#[async_trait]
impl MediaRenderer for FakeRenderer {
    async fn extract_mp3(
        &self,
        _media: &UploadedMedia,
        output: &Path,
    ) -> Result<(), ProcessingError> {
        self.mp3_calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(output, b"ID3 fake mp3").await.unwrap();
        Ok(())
    }

    async fn burn_captions(
        &self,
        _media: &UploadedMedia,
        video_filter: &str,
        output: &Path,
    ) -> Result<(), ProcessingError> {
        self.burn_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_filter.lock().unwrap() = Some(video_filter.to_string());
        tokio::fs::write(output, b"fake mp4").await.unwrap();
        Ok(())
    }
}

/// Router plus the fakes behind it
pub struct TestApp {
    pub dir: TempDir,
    pub state: AppState,
    pub normalizer: Arc<FakeNormalizer>,
    pub transcriber: Arc<FakeTranscriber>,
    pub renderer: Arc<FakeRenderer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(FakeNormalizer::new(3.0), FakeTranscriber::new(), 1024 * 1024)
    }

    pub fn with(
        normalizer: FakeNormalizer,
        transcriber: FakeTranscriber,
        max_upload_bytes: u64,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::with_cache_folder(dir.path().to_path_buf());
        config.max_upload_bytes = max_upload_bytes;

        let normalizer = Arc::new(normalizer);
        let transcriber = Arc::new(transcriber);
        let renderer = Arc::new(FakeRenderer::new());
        let state = AppState::new(
            config,
            normalizer.clone(),
            renderer.clone(),
            transcriber.clone(),
            EventBus::new(100),
        );

        Self {
            dir,
            state,
            normalizer,
            transcriber,
            renderer,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }

    /// Files left in the upload spool folder
    pub fn spooled_files(&self) -> usize {
        match std::fs::read_dir(self.dir.path().join("incoming")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

/// Encode a multipart body with an optional file part and text fields
pub fn multipart_body(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                 Content-Type: video/mp4\r\n\r\n",
                BOUNDARY, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// POST a multipart body with a declared Content-Length
pub fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
