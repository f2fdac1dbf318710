//! Transcription pipeline
//!
//! Runs one job per request: normalize → transcribe → format. Stages are
//! strictly sequential; a failure in any stage ends the job and nothing later
//! runs. Finished transcripts are cached by media id plus options, so a repeat
//! request for the same content never reaches ffmpeg or the backend.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use avt_common::events::{EventBus, PipelineEvent, PipelinePhase};

use crate::error::{ApiError, ApiResult};
use crate::models::{RawTranscription, Transcript, TranscriptionOptions, UploadedMedia};
use crate::services::ffmpeg::Normalizer;
use crate::services::store::MediaStore;
use crate::services::transcriber::Transcriber;

/// Transcript plus whether it came from the cache
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub transcript: Transcript,
    pub cached: bool,
}

#[derive(Clone)]
pub struct TranscriptionPipeline {
    normalizer: Arc<dyn Normalizer>,
    transcriber: Arc<dyn Transcriber>,
    store: MediaStore,
    event_bus: EventBus,
    default_model: String,
}

impl TranscriptionPipeline {
    pub fn new(
        normalizer: Arc<dyn Normalizer>,
        transcriber: Arc<dyn Transcriber>,
        store: MediaStore,
        event_bus: EventBus,
        default_model: String,
    ) -> Self {
        Self {
            normalizer,
            transcriber,
            store,
            event_bus,
            default_model,
        }
    }

    /// Transcribe `media`, reusing a cached transcript when one exists
    pub async fn transcribe(
        &self,
        media: &UploadedMedia,
        options: TranscriptionOptions,
    ) -> ApiResult<PipelineOutcome> {
        let options = options.with_default_model(&self.default_model);
        let transcript_id = options.transcript_id(&media.id);
        let job_id = Uuid::new_v4();

        if let Some(transcript) = self.store.load_transcript(&transcript_id).await? {
            info!(job_id = %job_id, transcript_id = %transcript_id, "Transcript served from cache");
            self.complete(job_id, &media.id, &transcript_id, true);
            return Ok(PipelineOutcome {
                transcript,
                cached: true,
            });
        }

        info!(
            job_id = %job_id,
            media_id = %media.id,
            language = ?options.language,
            task = options.task.as_str(),
            "Starting transcription job"
        );

        match self.run(job_id, media, options).await {
            Ok(transcript) => {
                self.complete(job_id, &media.id, &transcript.id, false);
                Ok(PipelineOutcome {
                    transcript,
                    cached: false,
                })
            }
            Err(e) => {
                warn!(job_id = %job_id, media_id = %media.id, error = %e, "Transcription job failed");
                self.event_bus.emit_lossy(PipelineEvent::JobFailed {
                    job_id,
                    media_id: media.id.clone(),
                    error: e.to_string(),
                    timestamp: avt_common::time::now(),
                });
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        job_id: Uuid,
        media: &UploadedMedia,
        options: TranscriptionOptions,
    ) -> ApiResult<Transcript> {
        // Normalized audio lives here and is removed with it
        let work_dir = self.store.scratch_dir()?;

        self.phase(job_id, &media.id, PipelinePhase::Normalizing);
        let audio = self.normalizer.normalize(media, work_dir.path()).await?;
        if audio.media_id != media.id {
            return Err(ApiError::Internal(format!(
                "Normalized audio belongs to {} not {}",
                audio.media_id, media.id
            )));
        }

        self.phase(job_id, &media.id, PipelinePhase::Transcribing);
        let raw = if audio.is_empty() {
            info!(job_id = %job_id, "Audio track is empty; skipping transcription backend");
            RawTranscription::default()
        } else {
            self.transcriber.transcribe(&audio, &options).await?
        };

        self.phase(job_id, &media.id, PipelinePhase::Formatting);
        let transcript = Transcript::from_raw(&media.id, options, audio.duration_secs, raw);
        self.store.save_transcript(&transcript).await?;

        if transcript.is_empty() {
            info!(job_id = %job_id, "No speech found in audio track");
        }
        info!(
            job_id = %job_id,
            transcript_id = %transcript.id,
            segments = transcript.segments.len(),
            duration_secs = audio.duration_secs,
            "Transcription job finished"
        );
        Ok(transcript)
    }

    fn phase(&self, job_id: Uuid, media_id: &str, phase: PipelinePhase) {
        self.event_bus
            .emit_lossy(PipelineEvent::phase_started(job_id, media_id, phase));
    }

    fn complete(&self, job_id: Uuid, media_id: &str, artifact: &str, cached: bool) {
        self.event_bus.emit_lossy(PipelineEvent::JobCompleted {
            job_id,
            media_id: media_id.to_string(),
            artifact: artifact.to_string(),
            cached,
            timestamp: avt_common::time::now(),
        });
    }
}
