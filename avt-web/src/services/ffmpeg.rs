//! ffmpeg invocation
//!
//! Audio normalization, MP3 extraction and caption burning all shell out to
//! ffmpeg. Invocations share a semaphore so concurrent requests cannot start
//! more encoders than configured, and each run has a hard timeout after which
//! the child is killed.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::config::ServiceConfig;
use crate::error::ProcessingError;
use crate::models::audio::{NORMALIZED_CODEC, NORMALIZED_SAMPLE_RATE};
use crate::models::{NormalizedAudio, UploadedMedia};

/// Lines of ffmpeg stderr kept in error messages
const STDERR_TAIL_LINES: usize = 12;

/// Converts an upload into the transcription audio format
#[async_trait]
pub trait Normalizer: Send + Sync {
    /// Write a mono 16 kHz PCM WAV of `media` into `work_dir`
    async fn normalize(
        &self,
        media: &UploadedMedia,
        work_dir: &Path,
    ) -> Result<NormalizedAudio, ProcessingError>;
}

/// Produces downloadable media derived from an upload
#[async_trait]
pub trait MediaRenderer: Send + Sync {
    /// Extract the audio track of `media` as MP3 into `output`
    async fn extract_mp3(&self, media: &UploadedMedia, output: &Path)
        -> Result<(), ProcessingError>;

    /// Re-encode `media` into `output` with the given `-vf` filter chain
    async fn burn_captions(
        &self,
        media: &UploadedMedia,
        video_filter: &str,
        output: &Path,
    ) -> Result<(), ProcessingError>;
}

/// ffmpeg binary with concurrency and time limits
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: PathBuf,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl Ffmpeg {
    pub fn new(program: PathBuf, timeout: Duration, max_concurrent: usize) -> Self {
        Self {
            program,
            timeout,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.ffmpeg_path.clone(),
            config.ffmpeg_timeout,
            config.max_concurrent_ffmpeg,
        )
    }

    /// Run `ffmpeg -version` and return the first line
    ///
    /// Called once at startup; a missing binary is a configuration error.
    pub async fn probe_version(&self) -> avt_common::Result<String> {
        let output = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(Duration::from_secs(10), output)
            .await
            .map_err(|_| {
                avt_common::Error::Config(format!(
                    "{} -version did not finish within 10s",
                    self.program.display()
                ))
            })?
            .map_err(|e| {
                avt_common::Error::Config(format!(
                    "ffmpeg not found at {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(avt_common::Error::Config(format!(
                "{} -version exited with {}",
                self.program.display(),
                output.status
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        Ok(version)
    }

    /// Run ffmpeg with `args`, mapping every failure to a [`ProcessingError`]
    async fn run(&self, operation: &str, args: Vec<OsString>) -> Result<(), ProcessingError> {
        let _permit = self.permits.acquire().await.map_err(|_| {
            ProcessingError::ToolUnavailable("ffmpeg limiter closed".to_string())
        })?;

        debug!(operation = operation, args = ?args, "Running ffmpeg");
        let started = std::time::Instant::now();

        let child = Command::new(&self.program)
            .args(["-nostdin", "-hide_banner", "-loglevel", "error", "-y"])
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProcessingError::ToolUnavailable(format!("{}: {}", self.program.display(), e))
            })?;

        // Dropping the child on timeout kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| ProcessingError::MediaTool {
                operation: operation.to_string(),
                detail: e.to_string(),
            })?,
            Err(_) => {
                return Err(ProcessingError::Timeout {
                    operation: operation.to_string(),
                    seconds: self.timeout.as_secs(),
                })
            }
        };

        if !output.status.success() {
            return Err(ProcessingError::MediaTool {
                operation: operation.to_string(),
                detail: stderr_tail(&output.stderr, output.status.code()),
            });
        }

        info!(
            operation = operation,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ffmpeg finished"
        );
        Ok(())
    }
}

#[async_trait]
impl Normalizer for Ffmpeg {
    async fn normalize(
        &self,
        media: &UploadedMedia,
        work_dir: &Path,
    ) -> Result<NormalizedAudio, ProcessingError> {
        let output = work_dir.join("normalized.wav");
        let sample_rate = NORMALIZED_SAMPLE_RATE.to_string();

        self.run(
            "Audio extraction",
            vec![
                "-i".into(),
                media.path.clone().into(),
                "-vn".into(),
                "-ac".into(),
                "1".into(),
                "-ar".into(),
                sample_rate.into(),
                "-c:a".into(),
                NORMALIZED_CODEC.into(),
                "-f".into(),
                "wav".into(),
                output.clone().into(),
            ],
        )
        .await?;

        inspect_wav(&media.id, output).await
    }
}

#[async_trait]
impl MediaRenderer for Ffmpeg {
    async fn extract_mp3(
        &self,
        media: &UploadedMedia,
        output: &Path,
    ) -> Result<(), ProcessingError> {
        self.run(
            "MP3 extraction",
            vec![
                "-i".into(),
                media.path.clone().into(),
                "-vn".into(),
                "-c:a".into(),
                "libmp3lame".into(),
                "-q:a".into(),
                "2".into(),
                "-f".into(),
                "mp3".into(),
                output.into(),
            ],
        )
        .await
    }

    async fn burn_captions(
        &self,
        media: &UploadedMedia,
        video_filter: &str,
        output: &Path,
    ) -> Result<(), ProcessingError> {
        self.run(
            "Caption burning",
            vec![
                "-i".into(),
                media.path.clone().into(),
                "-vf".into(),
                video_filter.into(),
                "-f".into(),
                "mp4".into(),
                output.into(),
            ],
        )
        .await
    }
}

/// Read the WAV header ffmpeg wrote and confirm it matches the target format
pub async fn inspect_wav(
    media_id: &str,
    path: PathBuf,
) -> Result<NormalizedAudio, ProcessingError> {
    let media_id = media_id.to_string();
    tokio::task::spawn_blocking(move || {
        let reader = hound::WavReader::open(&path)
            .map_err(|e| ProcessingError::InvalidAudio(e.to_string()))?;
        let spec = reader.spec();

        if spec.channels != 1
            || spec.sample_rate != NORMALIZED_SAMPLE_RATE
            || spec.bits_per_sample != 16
            || spec.sample_format != hound::SampleFormat::Int
        {
            return Err(ProcessingError::InvalidAudio(format!(
                "expected mono 16-bit {} Hz PCM, got {} ch {}-bit {} Hz",
                NORMALIZED_SAMPLE_RATE, spec.channels, spec.bits_per_sample, spec.sample_rate
            )));
        }

        let duration_secs = reader.duration() as f64 / spec.sample_rate as f64;
        Ok(NormalizedAudio {
            media_id,
            path,
            codec: NORMALIZED_CODEC.to_string(),
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            duration_secs,
        })
    })
    .await
    .map_err(|e| ProcessingError::InvalidAudio(format!("WAV inspection task failed: {}", e)))?
}

fn stderr_tail(stderr: &[u8], exit_code: Option<i32>) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");

    match (tail.is_empty(), exit_code) {
        (true, Some(code)) => format!("exit code {}", code),
        (true, None) => "terminated by signal".to_string(),
        (false, _) => tail,
    }
}
