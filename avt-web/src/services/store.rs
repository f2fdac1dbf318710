//! On-disk media cache
//!
//! Layout under the cache folder:
//!
//! ```text
//! incoming/<uuid>.part             uploads being received
//! media/<media_id>/input.<ext>     accepted upload
//! media/<media_id>/media.json      UploadedMedia metadata
//! media/<media_id>/audio.mp3       extracted MP3
//! media/<media_id>/captioned-*.mp4 burned caption renders
//! transcripts/<transcript_id>.json transcripts
//! work/job-*/                      per-job scratch (normalized audio, srt)
//! ```
//!
//! Directories are created lazily so the store keeps working after a clear.
//! Finished files are written under a temporary name and renamed into place.
//!
//! Requests hold a [`MediaLease`] on every media id they work with. Media
//! stored by a single-shot request is deleted when its last lease is released,
//! unless a staged upload claimed the same content in the meantime.

use std::collections::HashMap;
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tempfile::TempDir;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult, ValidationError};
use crate::models::media::is_media_id;
use crate::models::{Container, Transcript, UploadedMedia};

const MEDIA_METADATA_FILE: &str = "media.json";

/// Upload being written to `incoming/`; deleted on drop unless committed
#[derive(Debug)]
pub struct SpoolFile {
    path: PathBuf,
    file: Option<fs::File>,
    committed: bool,
}

impl SpoolFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(chunk).await,
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "spool file already closed",
            )),
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }
}

impl Drop for SpoolFile {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "Failed to remove spool file");
                }
            }
        }
    }
}

/// Details of a finished upload, before it has an id-based home
#[derive(Debug, Clone)]
pub struct SpooledUpload {
    pub media_id: String,
    pub size_bytes: u64,
    pub declared_type: Option<String>,
    pub filename: String,
    pub container: Container,
}

/// How long a committed upload is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Staged upload; stays until the cache is cleared
    Persistent,
    /// Single-shot upload; discarded once no request uses it
    Transient,
}

#[derive(Debug, Default)]
struct LeaseState {
    holders: usize,
    /// Stored by a transient commit in this process
    created_transient: bool,
    /// Claimed by a staged upload
    persistent: bool,
}

type LeaseTable = Arc<Mutex<HashMap<String, LeaseState>>>;

fn lock_leases(
    leases: &Mutex<HashMap<String, LeaseState>>,
) -> MutexGuard<'_, HashMap<String, LeaseState>> {
    leases.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Claim on a media id held for the duration of a request
#[derive(Debug)]
pub struct MediaLease {
    leases: LeaseTable,
    media_id: String,
    media_dir: PathBuf,
}

impl Drop for MediaLease {
    fn drop(&mut self) {
        // Commits lease under the same lock, so removal must stay inside it
        let mut leases = lock_leases(&self.leases);
        let Some(state) = leases.get_mut(&self.media_id) else {
            return;
        };
        state.holders = state.holders.saturating_sub(1);
        if state.holders > 0 {
            return;
        }

        let discard = state.created_transient && !state.persistent;
        leases.remove(&self.media_id);
        if !discard {
            return;
        }
        match std::fs::remove_dir_all(&self.media_dir) {
            Ok(()) => debug!(media_id = %self.media_id, "Discarded single-shot media"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(media_id = %self.media_id, error = %e, "Failed to discard single-shot media")
            }
        }
    }
}

/// Stored upload together with the lease keeping it on disk
#[derive(Debug)]
pub struct StoredMedia {
    pub media: UploadedMedia,
    _lease: MediaLease,
}

impl Deref for StoredMedia {
    type Target = UploadedMedia;

    fn deref(&self) -> &UploadedMedia {
        &self.media
    }
}

/// Handle to the cache folder
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    leases: LeaseTable,
}

impl MediaStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            leases: LeaseTable::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn incoming_dir(&self) -> PathBuf {
        self.root.join("incoming")
    }

    fn media_root(&self) -> PathBuf {
        self.root.join("media")
    }

    fn transcripts_dir(&self) -> PathBuf {
        self.root.join("transcripts")
    }

    fn work_dir(&self) -> PathBuf {
        self.root.join("work")
    }

    /// Directory for one media id; rejects anything that is not a media id
    pub fn media_dir(&self, media_id: &str) -> ApiResult<PathBuf> {
        if !is_media_id(media_id) {
            return Err(ValidationError::UnknownMedia(media_id.to_string()).into());
        }
        Ok(self.media_root().join(media_id))
    }

    pub fn mp3_path(&self, media_id: &str) -> ApiResult<PathBuf> {
        Ok(self.media_dir(media_id)?.join("audio.mp3"))
    }

    pub fn captioned_path(
        &self,
        media_id: &str,
        transcript_digest: &str,
        style_digest: &str,
    ) -> ApiResult<PathBuf> {
        Ok(self
            .media_dir(media_id)?
            .join(format!("captioned-{}-{}.mp4", transcript_digest, style_digest)))
    }

    fn transcript_path(&self, transcript_id: &str) -> PathBuf {
        self.transcripts_dir().join(format!("{}.json", transcript_id))
    }

    /// Start receiving an upload
    pub async fn create_spool(&self) -> io::Result<SpoolFile> {
        let dir = self.incoming_dir();
        fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.part", Uuid::new_v4()));
        let file = fs::File::create(&path).await?;
        Ok(SpoolFile {
            path,
            file: Some(file),
            committed: false,
        })
    }

    fn acquire(&self, media_id: &str, media_dir: &Path, retention: Option<Retention>) -> MediaLease {
        let mut leases = lock_leases(&self.leases);
        let state = leases.entry(media_id.to_string()).or_default();
        state.holders += 1;
        if retention == Some(Retention::Persistent) {
            state.persistent = true;
        }
        MediaLease {
            leases: self.leases.clone(),
            media_id: media_id.to_string(),
            media_dir: media_dir.to_path_buf(),
        }
    }

    fn mark_created_transient(&self, media_id: &str) {
        if let Some(state) = lock_leases(&self.leases).get_mut(media_id) {
            state.created_transient = true;
        }
    }

    /// Move a fully received upload into `media/<id>/`
    ///
    /// Returns the stored media and whether it was new. Identical content that
    /// is already stored is kept and the spool is discarded.
    pub async fn commit(
        &self,
        mut spool: SpoolFile,
        upload: SpooledUpload,
        retention: Retention,
    ) -> ApiResult<(StoredMedia, bool)> {
        spool.close().await?;

        let media_dir = self.media_dir(&upload.media_id)?;
        let lease = self.acquire(&upload.media_id, &media_dir, Some(retention));

        let metadata_path = media_dir.join(MEDIA_METADATA_FILE);
        if fs::try_exists(&metadata_path).await.unwrap_or(false) {
            let existing = self.read_media(&upload.media_id).await?;
            debug!(media_id = %upload.media_id, "Upload already cached");
            return Ok((
                StoredMedia {
                    media: existing,
                    _lease: lease,
                },
                false,
            ));
        }

        if retention == Retention::Transient {
            self.mark_created_transient(&upload.media_id);
        }
        fs::create_dir_all(&media_dir).await?;
        let input_path = media_dir.join(format!("input.{}", upload.container.extension()));
        fs::rename(spool.path(), &input_path).await?;
        spool.committed = true;

        let media = UploadedMedia {
            id: upload.media_id,
            path: input_path,
            size_bytes: upload.size_bytes,
            declared_type: upload.declared_type,
            filename: upload.filename,
            container: upload.container,
        };
        let metadata = serde_json::to_vec_pretty(&media)
            .map_err(|e| ApiError::Internal(format!("Serialize media metadata: {}", e)))?;
        write_atomic(&metadata_path, &metadata).await?;

        Ok((
            StoredMedia {
                media,
                _lease: lease,
            },
            true,
        ))
    }

    /// Look up a stored upload and hold it for the caller
    pub async fn load_media(&self, media_id: &str) -> ApiResult<StoredMedia> {
        let media_dir = self.media_dir(media_id)?;
        let lease = self.acquire(media_id, &media_dir, None);
        let media = self.read_media(media_id).await?;
        Ok(StoredMedia {
            media,
            _lease: lease,
        })
    }

    async fn read_media(&self, media_id: &str) -> ApiResult<UploadedMedia> {
        let metadata_path = self.media_dir(media_id)?.join(MEDIA_METADATA_FILE);
        let content = match fs::read(&metadata_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ValidationError::UnknownMedia(media_id.to_string()).into());
            }
            Err(e) => return Err(e.into()),
        };
        let media: UploadedMedia = serde_json::from_slice(&content)
            .map_err(|e| ApiError::Internal(format!("Corrupt media metadata: {}", e)))?;

        if !fs::try_exists(&media.path).await.unwrap_or(false) {
            return Err(ValidationError::UnknownMedia(media_id.to_string()).into());
        }
        Ok(media)
    }

    pub async fn save_transcript(&self, transcript: &Transcript) -> ApiResult<()> {
        fs::create_dir_all(self.transcripts_dir()).await?;
        let content = serde_json::to_vec_pretty(transcript)
            .map_err(|e| ApiError::Internal(format!("Serialize transcript: {}", e)))?;
        write_atomic(&self.transcript_path(&transcript.id), &content).await?;
        Ok(())
    }

    /// Load a transcript; `transcript_id` must already be validated
    pub async fn load_transcript(&self, transcript_id: &str) -> ApiResult<Option<Transcript>> {
        let content = match fs::read(self.transcript_path(transcript_id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&content) {
            Ok(transcript) => Ok(Some(transcript)),
            Err(e) => {
                // Treat as a cache miss; the transcript is regenerated
                warn!(transcript_id = %transcript_id, error = %e, "Discarding corrupt cached transcript");
                Ok(None)
            }
        }
    }

    /// Scratch directory removed when the returned guard drops
    pub fn scratch_dir(&self) -> io::Result<TempDir> {
        let work = self.work_dir();
        std::fs::create_dir_all(&work)?;
        tempfile::Builder::new().prefix("job-").tempdir_in(work)
    }

    /// Path in the work folder for a file that will be renamed into the cache
    pub fn staging_path(&self, extension: &str) -> io::Result<PathBuf> {
        let work = self.work_dir();
        std::fs::create_dir_all(&work)?;
        Ok(work.join(format!("{}.{}", Uuid::new_v4(), extension)))
    }

    /// Wipe stored media and transcripts; returns the number of entries removed
    ///
    /// Uploads still being received are left alone.
    pub async fn clear(&self) -> io::Result<usize> {
        let mut removed = 0;
        for dir in [self.media_root(), self.transcripts_dir()] {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let result = if entry.file_type().await?.is_dir() {
                    fs::remove_dir_all(&path).await
                } else {
                    fs::remove_file(&path).await
                };
                match result {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }
        }

        info!(removed_entries = removed, root = %self.root.display(), "Cache cleared");
        Ok(removed)
    }
}

/// Write `content` to `path` via a temporary sibling and rename
async fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
    fs::write(&tmp, content).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}
