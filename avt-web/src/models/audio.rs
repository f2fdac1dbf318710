//! Normalized audio produced by ffmpeg

use std::path::PathBuf;

/// Codec every normalized file is encoded with
pub const NORMALIZED_CODEC: &str = "pcm_s16le";

/// Sample rate every normalized file is resampled to
pub const NORMALIZED_SAMPLE_RATE: u32 = 16_000;

/// Mono 16 kHz PCM WAV derived from exactly one [`crate::models::UploadedMedia`]
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAudio {
    /// Id of the upload this audio was extracted from
    pub media_id: String,
    pub path: PathBuf,
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_secs: f64,
}

impl NormalizedAudio {
    /// Audio with no samples; transcription is skipped for it
    pub fn is_empty(&self) -> bool {
        self.duration_secs <= 0.0
    }
}
