//! Configuration file model and cache folder resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument or environment variable (handled by the binary)
//! 2. TOML config file
//! 3. Compiled default
//!
//! A missing config file is not an error: the service logs a warning and
//! starts on compiled defaults. A config file that exists but cannot be parsed
//! is a configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 7860;

/// Default bind address
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default upload ceiling in megabytes
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 200;

/// Application directory name used under the platform config/cache dirs
const APP_DIR_NAME: &str = "avt";

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Address to bind the HTTP listener to
    pub bind_address: Option<String>,
    /// HTTP port
    pub port: Option<u16>,
    /// Upload ceiling in megabytes
    pub max_upload_mb: Option<u64>,
    /// Folder holding uploaded media and derived artifacts
    pub cache_folder: Option<PathBuf>,
    pub ffmpeg: FfmpegConfig,
    pub transcription: TranscriptionConfig,
    pub logging: LoggingConfig,
}

/// `[ffmpeg]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    /// Executable name or path
    pub path: Option<PathBuf>,
    /// Per-invocation timeout
    pub timeout_secs: Option<u64>,
    /// Maximum simultaneous ffmpeg processes
    pub max_concurrent: Option<usize>,
}

/// `[transcription]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Base URL of an OpenAI-compatible Whisper API (e.g. `http://localhost:8000/v1`)
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// `[logging]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Parse TOML text into a [`TomlConfig`]
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    Ok(toml::from_str(content)?)
}

/// Locate the default config file for this platform, if one exists
///
/// Checks `~/.config/avt/config.toml` first, then `/etc/avt/config.toml` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(APP_DIR_NAME).join("config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// A parsed config file and where it came from
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    /// `None` when no file was found and compiled defaults are in effect
    pub source: Option<PathBuf>,
}

/// Load the TOML configuration
///
/// An explicitly requested file must exist. Without an explicit path the
/// platform default is tried, and its absence yields defaults. Nothing is
/// logged here because this runs before the tracing subscriber is installed.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) => path,
            None => return Ok(LoadedConfig::default()),
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = parse_toml_config(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    Ok(LoadedConfig {
        config,
        source: Some(path),
    })
}

/// OS-dependent default cache folder
pub fn default_cache_folder() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./cache"))
}

/// Resolves the cache folder from CLI/ENV, TOML, then compiled default
#[derive(Debug, Clone, Default)]
pub struct CacheFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl CacheFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, toml_value: Option<PathBuf>) -> Self {
        Self {
            cli_arg,
            toml_value,
        }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }
        if let Some(path) = &self.toml_value {
            return path.clone();
        }
        default_cache_folder()
    }
}

/// Creates the cache folder and verifies it is writable
#[derive(Debug, Clone)]
pub struct CacheFolderInitializer {
    cache_folder: PathBuf,
}

impl CacheFolderInitializer {
    pub fn new(cache_folder: PathBuf) -> Self {
        Self { cache_folder }
    }

    pub fn cache_folder(&self) -> &Path {
        &self.cache_folder
    }

    /// Create the folder if missing and probe that files can be written into it
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.cache_folder).map_err(|e| {
            Error::Config(format!(
                "Cannot create cache folder {}: {}",
                self.cache_folder.display(),
                e
            ))
        })?;

        let probe = self.cache_folder.join(".write_probe");
        std::fs::write(&probe, b"ok").map_err(|e| {
            Error::Config(format!(
                "Cache folder {} is not writable: {}",
                self.cache_folder.display(),
                e
            ))
        })?;
        let _ = std::fs::remove_file(&probe);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_folder_is_platform_cache_dir() {
        let folder = default_cache_folder();
        match dirs::cache_dir() {
            Some(cache) => assert_eq!(folder, cache.join("avt")),
            None => assert_eq!(folder, PathBuf::from("./cache")),
        }
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse_toml_config(
            r#"
            bind_address = "127.0.0.1"
            port = 8080
            max_upload_mb = 50
            cache_folder = "/tmp/avt-cache"

            [ffmpeg]
            path = "/usr/local/bin/ffmpeg"
            timeout_secs = 30
            max_concurrent = 4

            [transcription]
            base_url = "http://localhost:8000/v1"
            model = "whisper-1"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_address.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.max_upload_mb, Some(50));
        assert_eq!(config.cache_folder, Some(PathBuf::from("/tmp/avt-cache")));
        assert_eq!(config.ffmpeg.max_concurrent, Some(4));
        assert_eq!(config.transcription.model.as_deref(), Some("whisper-1"));
        assert!(config.transcription.api_key.is_none());
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = parse_toml_config("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_invalid_config_is_error() {
        let result = parse_toml_config("port = \"not a number\"");
        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn test_explicit_missing_file_is_config_error() {
        let result = load_toml_config(Some(Path::new("/nonexistent/avt/config.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_resolver_priority() {
        let cli = PathBuf::from("/from/cli");
        let toml = PathBuf::from("/from/toml");

        let resolver = CacheFolderResolver::new(Some(cli.clone()), Some(toml.clone()));
        assert_eq!(resolver.resolve(), cli);

        let resolver = CacheFolderResolver::new(None, Some(toml.clone()));
        assert_eq!(resolver.resolve(), toml);

        let resolver = CacheFolderResolver::new(None, None);
        assert_eq!(resolver.resolve(), default_cache_folder());
    }
}
