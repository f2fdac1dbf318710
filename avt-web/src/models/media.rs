//! Uploaded media

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ValidationError;

/// Accepted video containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mp4,
    Mov,
    Avi,
    Mkv,
}

impl Container {
    /// Determine the container from an uploaded file name's extension
    pub fn from_filename(filename: &str) -> Result<Self, ValidationError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "mp4" => Ok(Container::Mp4),
            "mov" => Ok(Container::Mov),
            "avi" => Ok(Container::Avi),
            "mkv" => Ok(Container::Mkv),
            "" => Err(ValidationError::UnsupportedType(format!(
                "{} (no extension)",
                filename
            ))),
            other => Err(ValidationError::UnsupportedType(format!(".{}", other))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Mov => "mov",
            Container::Avi => "avi",
            Container::Mkv => "mkv",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Container::Mp4 => "video/mp4",
            Container::Mov => "video/quicktime",
            Container::Avi => "video/x-msvideo",
            Container::Mkv => "video/x-matroska",
        }
    }
}

/// A user-submitted file that passed the ingestion gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedMedia {
    /// Hex SHA-256 of the file content
    pub id: String,
    /// Location of the spooled upload
    pub path: PathBuf,
    pub size_bytes: u64,
    /// MIME type declared by the client, if any
    pub declared_type: Option<String>,
    pub filename: String,
    pub container: Container,
}

/// True if `id` looks like a media id (64 lowercase hex digits)
pub fn is_media_id(id: &str) -> bool {
    id.len() == 64 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_from_filename_is_case_insensitive() {
        assert_eq!(Container::from_filename("clip.MP4").unwrap(), Container::Mp4);
        assert_eq!(Container::from_filename("a.b.mkv").unwrap(), Container::Mkv);
        assert_eq!(Container::from_filename("Movie.Mov").unwrap(), Container::Mov);
        assert_eq!(Container::from_filename("x.avi").unwrap(), Container::Avi);
    }

    #[test]
    fn test_container_rejects_other_types() {
        assert!(matches!(
            Container::from_filename("notes.txt"),
            Err(ValidationError::UnsupportedType(_))
        ));
        assert!(matches!(
            Container::from_filename("video"),
            Err(ValidationError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_media_id_validation() {
        assert!(is_media_id(&"a".repeat(64)));
        assert!(!is_media_id(&"A".repeat(64)));
        assert!(!is_media_id("../../etc/passwd"));
        assert!(!is_media_id(&"a".repeat(63)));
    }
}
