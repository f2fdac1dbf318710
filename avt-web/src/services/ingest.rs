//! Upload ingestion gate
//!
//! Accepts a multipart body and produces a [`StoredMedia`] or a
//! [`ValidationError`]. Nothing downstream ever sees a rejected upload:
//! the file is spooled to `incoming/` while hashing, and only moved into the
//! cache once it passed every check. The size ceiling is enforced while
//! streaming, so an oversized body is cut off without being read to the end.

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use avt_common::events::{EventBus, PipelineEvent};

use crate::error::{ApiError, ApiResult, ValidationError};
use crate::models::Container;
use crate::services::store::{MediaStore, Retention, SpoolFile, SpooledUpload, StoredMedia};

/// Multipart text fields that are kept; others are skipped
const TEXT_FIELDS: &[&str] = &["language", "task", "model"];

const MAX_TEXT_FIELD_BYTES: usize = 256;

/// Result of a successful ingestion
#[derive(Debug)]
pub struct IngestedUpload {
    /// Held on disk until this upload is dropped
    pub media: StoredMedia,
    /// Text fields that accompanied the file
    pub fields: HashMap<String, String>,
    /// False when identical content was already cached
    pub newly_stored: bool,
}

struct ReceivedFile {
    spool: SpoolFile,
    media_id: String,
    size_bytes: u64,
    filename: String,
    declared_type: Option<String>,
    container: Container,
}

pub struct IngestionGate<'a> {
    store: &'a MediaStore,
    event_bus: &'a EventBus,
    max_upload_bytes: u64,
}

impl<'a> IngestionGate<'a> {
    pub fn new(store: &'a MediaStore, event_bus: &'a EventBus, max_upload_bytes: u64) -> Self {
        Self {
            store,
            event_bus,
            max_upload_bytes,
        }
    }

    /// Validate and store an upload
    pub async fn accept(
        &self,
        multipart: Multipart,
        retention: Retention,
    ) -> ApiResult<IngestedUpload> {
        match self.receive(multipart, retention).await {
            Ok(upload) => {
                info!(
                    media_id = %upload.media.id,
                    filename = %upload.media.filename,
                    size_bytes = upload.media.size_bytes,
                    newly_stored = upload.newly_stored,
                    "Upload accepted"
                );
                self.event_bus.emit_lossy(PipelineEvent::MediaAccepted {
                    media_id: upload.media.id.clone(),
                    size_bytes: upload.media.size_bytes,
                    filename: upload.media.filename.clone(),
                    timestamp: avt_common::time::now(),
                });
                Ok(upload)
            }
            Err(e) => {
                if e.is_validation() {
                    self.event_bus.emit_lossy(PipelineEvent::MediaRejected {
                        reason: e.to_string(),
                        timestamp: avt_common::time::now(),
                    });
                }
                Err(e)
            }
        }
    }

    async fn receive(
        &self,
        mut multipart: Multipart,
        retention: Retention,
    ) -> ApiResult<IngestedUpload> {
        let mut fields = HashMap::new();
        let mut received: Option<ReceivedFile> = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| self.multipart_error(e))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == "file" {
                if received.is_some() {
                    return Err(ValidationError::InvalidRequest(
                        "Only one file may be uploaded per request".to_string(),
                    )
                    .into());
                }
                received = Some(self.receive_file(field).await?);
            } else if TEXT_FIELDS.contains(&name.as_str()) {
                let value = self.receive_text(&name, field).await?;
                fields.insert(name, value);
            } else {
                debug!(field = %name, "Skipping unknown multipart field");
            }
        }

        let received = received.ok_or(ValidationError::MissingFile)?;
        if received.size_bytes == 0 {
            return Err(ValidationError::EmptyFile.into());
        }

        let (media, newly_stored) = self
            .store
            .commit(
                received.spool,
                SpooledUpload {
                    media_id: received.media_id,
                    size_bytes: received.size_bytes,
                    declared_type: received.declared_type,
                    filename: received.filename,
                    container: received.container,
                },
                retention,
            )
            .await?;

        Ok(IngestedUpload {
            media,
            fields,
            newly_stored,
        })
    }

    /// Read a short text field, giving up as soon as it is too long
    async fn receive_text(&self, name: &str, mut field: Field<'_>) -> ApiResult<String> {
        let mut value = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| self.multipart_error(e))? {
            if value.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
                return Err(
                    ValidationError::InvalidRequest(format!("Field '{}' is too long", name)).into(),
                );
            }
            value.extend_from_slice(&chunk);
        }
        String::from_utf8(value).map_err(|_| {
            ValidationError::InvalidRequest(format!("Field '{}' is not valid UTF-8", name)).into()
        })
    }

    /// Stream the file field to a spool file, hashing as it goes
    async fn receive_file(&self, mut field: Field<'_>) -> ApiResult<ReceivedFile> {
        let filename = field
            .file_name()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or(ValidationError::MissingFile)?;
        // Reject by type before reading any content
        let container = Container::from_filename(&filename)?;
        let declared_type = field.content_type().map(str::to_string);

        let mut spool = self.store.create_spool().await?;
        let mut hasher = Sha256::new();
        let mut size_bytes: u64 = 0;

        while let Some(chunk) = field.chunk().await.map_err(|e| self.multipart_error(e))? {
            size_bytes += chunk.len() as u64;
            if size_bytes > self.max_upload_bytes {
                warn!(
                    filename = %filename,
                    limit_bytes = self.max_upload_bytes,
                    "Upload exceeded size limit while streaming"
                );
                return Err(self.too_large());
            }
            hasher.update(&chunk);
            spool.write_chunk(&chunk).await?;
        }

        Ok(ReceivedFile {
            spool,
            media_id: format!("{:x}", hasher.finalize()),
            size_bytes,
            filename,
            declared_type,
            container,
        })
    }

    fn too_large(&self) -> ApiError {
        ValidationError::TooLarge {
            limit_bytes: self.max_upload_bytes,
        }
        .into()
    }

    fn multipart_error(&self, err: MultipartError) -> ApiError {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            self.too_large()
        } else {
            ValidationError::InvalidRequest(err.body_text()).into()
        }
    }
}
