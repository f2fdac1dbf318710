//! Transcripts and the options they are produced with

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::error::ValidationError;
use crate::models::media::is_media_id;

/// Duration given to a segment whose end time the backend did not report
const MISSING_END_FALLBACK_SECS: f64 = 3.0;

/// Spoken-language names accepted in addition to ISO-639-1 codes
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("english", "en"),
    ("akan", "ak"),
    ("akan (twi)", "ak"),
    ("twi", "ak"),
    ("spanish", "es"),
    ("french", "fr"),
    ("german", "de"),
    ("italian", "it"),
    ("portuguese", "pt"),
    ("dutch", "nl"),
    ("russian", "ru"),
    ("japanese", "ja"),
    ("chinese", "zh"),
    ("arabic", "ar"),
    ("hindi", "hi"),
    ("swahili", "sw"),
    ("yoruba", "yo"),
];

/// What the backend should produce
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    /// Text in the spoken language
    #[default]
    Transcribe,
    /// English translation of the speech
    Translate,
}

impl Task {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "transcribe" => Ok(Task::Transcribe),
            "translate" => Ok(Task::Translate),
            other => Err(ValidationError::InvalidRequest(format!(
                "Unknown task: {} (expected transcribe or translate)",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Transcribe => "transcribe",
            Task::Translate => "translate",
        }
    }
}

/// Per-request transcription settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionOptions {
    /// ISO-639-1 code; `None` lets the backend auto-detect
    pub language: Option<String>,
    #[serde(default)]
    pub task: Task,
    /// Backend model; `None` uses the service default
    pub model: Option<String>,
}

impl TranscriptionOptions {
    /// Build options from loosely typed request values, validating each
    pub fn parse(
        language: Option<&str>,
        task: Option<&str>,
        model: Option<&str>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            language: language.map(normalize_language).transpose()?.flatten(),
            task: task.map(Task::parse).transpose()?.unwrap_or_default(),
            model: model.map(validate_model).transpose()?.flatten(),
        })
    }

    /// Options from multipart text fields (`language`, `task`, `model`)
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, ValidationError> {
        Self::parse(
            fields.get("language").map(String::as_str),
            fields.get("task").map(String::as_str),
            fields.get("model").map(String::as_str),
        )
    }

    /// Re-validate options that arrived as JSON
    pub fn validated(self) -> Result<Self, ValidationError> {
        Self::parse(
            self.language.as_deref(),
            Some(self.task.as_str()),
            self.model.as_deref(),
        )
    }

    /// Fill in the service default model
    pub fn with_default_model(mut self, default_model: &str) -> Self {
        if self.model.is_none() {
            self.model = Some(default_model.to_string());
        }
        self
    }

    /// Stable 16 hex digit fingerprint of these options
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.model.as_deref().unwrap_or_default().as_bytes());
        hasher.update(b"|");
        hasher.update(self.language.as_deref().unwrap_or("auto").as_bytes());
        hasher.update(b"|");
        hasher.update(self.task.as_str().as_bytes());
        let hex = format!("{:x}", hasher.finalize());
        hex[..16].to_string()
    }

    /// Transcript id for `media_id` under these options
    pub fn transcript_id(&self, media_id: &str) -> String {
        format!("{}-{}", media_id, self.digest())
    }
}

fn normalize_language(value: &str) -> Result<Option<String>, ValidationError> {
    let lowered = value.trim().to_ascii_lowercase();
    if lowered.is_empty() || lowered == "auto" || lowered == "auto-detect" {
        return Ok(None);
    }
    if lowered.len() == 2 && lowered.bytes().all(|b| b.is_ascii_lowercase()) {
        return Ok(Some(lowered));
    }
    LANGUAGE_NAMES
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|(_, code)| Some((*code).to_string()))
        .ok_or_else(|| ValidationError::InvalidRequest(format!("Unsupported language: {}", value)))
}

fn validate_model(value: &str) -> Result<Option<String>, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let valid = trimmed.len() <= 64
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':'));
    if !valid {
        return Err(ValidationError::InvalidRequest(format!(
            "Invalid model name: {}",
            trimmed
        )));
    }
    Ok(Some(trimmed.to_string()))
}

/// Split a transcript id into media id and options digest
pub fn parse_transcript_id(id: &str) -> Result<(&str, &str), ValidationError> {
    let unknown = || ValidationError::UnknownTranscript(id.to_string());
    let (media_id, digest) = id.split_once('-').ok_or_else(unknown)?;
    let digest_ok = digest.len() == 16
        && digest
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    if !is_media_id(media_id) || !digest_ok {
        return Err(unknown());
    }
    Ok((media_id, digest))
}

/// Segment as reported by a backend; timestamps may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub text: String,
}

/// Backend output before cleanup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTranscription {
    pub text: String,
    pub language: Option<String>,
    pub segments: Vec<RawSegment>,
}

/// Timed piece of a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Seconds from the start of the media
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Transcription result for one normalized audio file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub media_id: String,
    pub options: TranscriptionOptions,
    pub text: String,
    pub language: Option<String>,
    pub duration_secs: f64,
    pub segments: Vec<Segment>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Transcript {
    /// Clean up backend output into a transcript
    ///
    /// Missing start times continue from the previous segment's end, missing
    /// end times last [`MISSING_END_FALLBACK_SECS`]. Blank segments are dropped.
    /// Text without segments becomes one segment spanning the audio.
    pub fn from_raw(
        media_id: &str,
        options: TranscriptionOptions,
        duration_secs: f64,
        raw: RawTranscription,
    ) -> Self {
        let mut segments = Vec::with_capacity(raw.segments.len());
        let mut last_known_time = 0.0_f64;

        for raw_segment in raw.segments {
            let start = raw_segment
                .start
                .filter(|t| t.is_finite() && *t >= 0.0)
                .unwrap_or(last_known_time);
            let end = raw_segment
                .end
                .filter(|t| t.is_finite() && *t >= 0.0)
                .unwrap_or(start + MISSING_END_FALLBACK_SECS)
                .max(start);
            last_known_time = end;

            let text = raw_segment.text.trim();
            if text.is_empty() {
                continue;
            }
            segments.push(Segment {
                start,
                end,
                text: text.to_string(),
            });
        }

        let mut text = raw.text.trim().to_string();
        if text.is_empty() {
            text = segments
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
        } else if segments.is_empty() {
            let end = if duration_secs > 0.0 {
                duration_secs
            } else {
                MISSING_END_FALLBACK_SECS
            };
            segments.push(Segment {
                start: 0.0,
                end,
                text: text.clone(),
            });
        }

        Self {
            id: options.transcript_id(media_id),
            media_id: media_id.to_string(),
            options,
            text,
            language: raw.language.filter(|l| !l.trim().is_empty()),
            duration_secs,
            segments,
            created_at: avt_common::time::now(),
        }
    }

    /// Transcript of silent or zero-length audio
    pub fn empty(media_id: &str, options: TranscriptionOptions, duration_secs: f64) -> Self {
        Self::from_raw(media_id, options, duration_secs, RawTranscription::default())
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
