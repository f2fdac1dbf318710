//! Pipeline event types and broadcast event bus
//!
//! Every stage of a transcription job announces itself on the [`EventBus`].
//! The web service forwards these events to browsers over Server-Sent Events;
//! nothing else depends on them, so emitting with no subscribers is normal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Phase of a processing job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelinePhase {
    /// ffmpeg extracting the audio track
    Normalizing,
    /// Waiting on the transcription backend
    Transcribing,
    /// Building segments and rendered outputs
    Formatting,
    /// ffmpeg ripping MP3 audio
    ExtractingMp3,
    /// ffmpeg rendering subtitles onto the video
    BurningCaptions,
}

impl PipelinePhase {
    /// Rough completion percentage shown when the phase starts
    pub fn progress_percent(&self) -> u8 {
        match self {
            PipelinePhase::Normalizing => 25,
            PipelinePhase::Transcribing => 50,
            PipelinePhase::Formatting => 75,
            PipelinePhase::ExtractingMp3 | PipelinePhase::BurningCaptions => 50,
        }
    }

    /// Human-readable status line
    pub fn description(&self) -> &'static str {
        match self {
            PipelinePhase::Normalizing => "Extracting audio track",
            PipelinePhase::Transcribing => "Transcribing audio",
            PipelinePhase::Formatting => "Formatting subtitles",
            PipelinePhase::ExtractingMp3 => "Ripping MP3 audio",
            PipelinePhase::BurningCaptions => "Burning captions onto video",
        }
    }
}

/// Events emitted by the transcription service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// Upload passed the ingestion gate
    MediaAccepted {
        media_id: String,
        size_bytes: u64,
        filename: String,
        timestamp: DateTime<Utc>,
    },

    /// Upload rejected at the ingestion gate
    MediaRejected {
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A job entered a new phase
    PhaseStarted {
        job_id: Uuid,
        media_id: String,
        phase: PipelinePhase,
        progress_percent: u8,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A job finished successfully
    JobCompleted {
        job_id: Uuid,
        media_id: String,
        /// Artifact produced (transcript id or file name)
        artifact: String,
        cached: bool,
        timestamp: DateTime<Utc>,
    },

    /// A job failed
    JobFailed {
        job_id: Uuid,
        media_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// The server cache was wiped
    CacheCleared {
        removed_entries: usize,
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// Build a [`PipelineEvent::PhaseStarted`] for `phase`
    pub fn phase_started(job_id: Uuid, media_id: &str, phase: PipelinePhase) -> Self {
        PipelineEvent::PhaseStarted {
            job_id,
            media_id: media_id.to_string(),
            phase,
            progress_percent: phase.progress_percent(),
            message: phase.description().to_string(),
            timestamp: crate::time::now(),
        }
    }

    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::MediaAccepted { .. } => "MediaAccepted",
            PipelineEvent::MediaRejected { .. } => "MediaRejected",
            PipelineEvent::PhaseStarted { .. } => "PhaseStarted",
            PipelineEvent::JobCompleted { .. } => "JobCompleted",
            PipelineEvent::JobFailed { .. } => "JobFailed",
            PipelineEvent::CacheCleared { .. } => "CacheCleared",
        }
    }
}

/// Broadcast bus for [`PipelineEvent`]s
///
/// Cloning the bus shares the underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PipelineEvent,
    ) -> Result<usize, broadcast::error::SendError<PipelineEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
