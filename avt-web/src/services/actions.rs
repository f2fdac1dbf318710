//! Derived media: MP3 audio track and caption-burned video
//!
//! Outputs are rendered into the work folder and renamed into the media's
//! cache directory only once ffmpeg succeeded, so a cached file is always
//! complete.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use avt_common::events::{EventBus, PipelineEvent, PipelinePhase};

use crate::error::{ApiResult, ValidationError};
use crate::models::{CaptionStyle, Transcript, UploadedMedia};
use crate::services::ffmpeg::MediaRenderer;
use crate::services::render::render_srt;
use crate::services::store::MediaStore;

/// File ready for download
#[derive(Debug, Clone)]
pub struct RenderedFile {
    pub path: PathBuf,
    pub cached: bool,
}

#[derive(Clone)]
pub struct MediaActions {
    renderer: Arc<dyn MediaRenderer>,
    store: MediaStore,
    event_bus: EventBus,
}

impl MediaActions {
    pub fn new(renderer: Arc<dyn MediaRenderer>, store: MediaStore, event_bus: EventBus) -> Self {
        Self {
            renderer,
            store,
            event_bus,
        }
    }

    /// Audio track of `media` as MP3
    pub async fn extract_mp3(&self, media: &UploadedMedia) -> ApiResult<RenderedFile> {
        let output = self.store.mp3_path(&media.id)?;
        let job_id = Uuid::new_v4();
        if tokio::fs::try_exists(&output).await.unwrap_or(false) {
            self.complete(job_id, media, &output, true);
            return Ok(RenderedFile {
                path: output,
                cached: true,
            });
        }

        self.phase(job_id, media, PipelinePhase::ExtractingMp3);
        let result: ApiResult<()> = async {
            let staging = self.store.staging_path("mp3")?;
            let rendered = self.renderer.extract_mp3(media, &staging).await;
            promote(rendered.map_err(Into::into), &staging, &output).await
        }
        .await;

        self.finish(job_id, media, &output, result)
    }

    /// Re-encode `media` with `transcript` burned in as styled captions
    pub async fn burn_captions(
        &self,
        media: &UploadedMedia,
        transcript: &Transcript,
        style: &CaptionStyle,
    ) -> ApiResult<RenderedFile> {
        if transcript.media_id != media.id {
            return Err(ValidationError::InvalidRequest(format!(
                "Transcript {} does not belong to media {}",
                transcript.id, media.id
            ))
            .into());
        }
        if transcript.segments.is_empty() {
            return Err(ValidationError::InvalidRequest(
                "Transcript has no captions to burn".to_string(),
            )
            .into());
        }
        style.validate()?;

        let output =
            self.store
                .captioned_path(&media.id, &transcript.options.digest(), &style.digest())?;
        let job_id = Uuid::new_v4();
        if tokio::fs::try_exists(&output).await.unwrap_or(false) {
            self.complete(job_id, media, &output, true);
            return Ok(RenderedFile {
                path: output,
                cached: true,
            });
        }

        self.phase(job_id, media, PipelinePhase::BurningCaptions);
        let result: ApiResult<()> = async {
            let work_dir = self.store.scratch_dir()?;
            let subtitles = work_dir.path().join("subtitles.srt");
            tokio::fs::write(&subtitles, render_srt(transcript)).await?;

            let filter = style.video_filter(&subtitles)?;
            let staging = self.store.staging_path("mp4")?;
            let rendered = self.renderer.burn_captions(media, &filter, &staging).await;
            promote(rendered.map_err(Into::into), &staging, &output).await
        }
        .await;

        self.finish(job_id, media, &output, result)
    }

    fn finish(
        &self,
        job_id: Uuid,
        media: &UploadedMedia,
        output: &Path,
        result: ApiResult<()>,
    ) -> ApiResult<RenderedFile> {
        match result {
            Ok(()) => {
                info!(job_id = %job_id, path = %output.display(), "Media rendered");
                self.complete(job_id, media, output, false);
                Ok(RenderedFile {
                    path: output.to_path_buf(),
                    cached: false,
                })
            }
            Err(e) => {
                warn!(job_id = %job_id, media_id = %media.id, error = %e, "Media render failed");
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

    fn phase(&self, job_id: Uuid, media: &UploadedMedia, phase: PipelinePhase) {
        self.event_bus
            .emit_lossy(PipelineEvent::phase_started(job_id, &media.id, phase));
    }

    fn complete(&self, job_id: Uuid, media: &UploadedMedia, output: &Path, cached: bool) {
        let artifact = output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.event_bus.emit_lossy(PipelineEvent::JobCompleted {
            job_id,
            media_id: media.id.clone(),
            artifact,
            cached,
            timestamp: avt_common::time::now(),
        });
    }
}

/// Move a finished render into the cache, or clean up after a failed one
async fn promote(rendered: ApiResult<()>, staging: &Path, output: &Path) -> ApiResult<()> {
    if let Err(e) = rendered {
        let _ = tokio::fs::remove_file(staging).await;
        return Err(e);
    }
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if let Err(e) = tokio::fs::rename(staging, output).await {
        let _ = tokio::fs::remove_file(staging).await;
        return Err(e.into());
    }
    Ok(())
}
