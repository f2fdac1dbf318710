//! Service configuration
//!
//! [`Args`] are parsed by clap (each flag also reads an `AVT_*` environment
//! variable). [`ServiceConfig::resolve`] layers them over the TOML file and
//! compiled defaults into the single config object handed to [`crate::AppState`].

use avt_common::config::{
    CacheFolderResolver, TomlConfig, DEFAULT_BIND_ADDRESS, DEFAULT_MAX_UPLOAD_MB, DEFAULT_PORT,
};
use avt_common::{Error, Result};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Default OpenAI-compatible transcription endpoint (e.g. a local faster-whisper server)
pub const DEFAULT_TRANSCRIPTION_URL: &str = "http://127.0.0.1:8000/v1";

/// Default transcription model name
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

const DEFAULT_FFMPEG: &str = "ffmpeg";
const DEFAULT_FFMPEG_TIMEOUT_SECS: u64 = 600;
const DEFAULT_MAX_CONCURRENT_FFMPEG: usize = 2;
const DEFAULT_TRANSCRIPTION_TIMEOUT_SECS: u64 = 900;

/// Command-line arguments for avt-web
#[derive(Parser, Debug, Default)]
#[command(name = "avt-web")]
#[command(about = "AI Video Transcriber web service")]
#[command(version)]
pub struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "AVT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind to
    #[arg(long, env = "AVT_BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "AVT_PORT")]
    pub port: Option<u16>,

    /// Maximum upload size in megabytes
    #[arg(long, env = "AVT_MAX_UPLOAD_MB")]
    pub max_upload_mb: Option<u64>,

    /// Folder for uploaded media and derived artifacts
    #[arg(long, env = "AVT_CACHE_FOLDER")]
    pub cache_folder: Option<PathBuf>,

    /// ffmpeg executable
    #[arg(long, env = "AVT_FFMPEG")]
    pub ffmpeg: Option<PathBuf>,

    /// Per-invocation ffmpeg timeout in seconds
    #[arg(long, env = "AVT_FFMPEG_TIMEOUT_SECS")]
    pub ffmpeg_timeout_secs: Option<u64>,

    /// Maximum simultaneous ffmpeg processes
    #[arg(long, env = "AVT_MAX_CONCURRENT_FFMPEG")]
    pub max_concurrent_ffmpeg: Option<usize>,

    /// Base URL of the OpenAI-compatible transcription API
    #[arg(long, env = "AVT_TRANSCRIPTION_URL")]
    pub transcription_url: Option<String>,

    /// Bearer token for the transcription API
    #[arg(long, env = "AVT_TRANSCRIPTION_API_KEY", hide_env_values = true)]
    pub transcription_api_key: Option<String>,

    /// Default transcription model
    #[arg(long, env = "AVT_TRANSCRIPTION_MODEL")]
    pub transcription_model: Option<String>,

    /// Transcription request timeout in seconds
    #[arg(long, env = "AVT_TRANSCRIPTION_TIMEOUT_SECS")]
    pub transcription_timeout_secs: Option<u64>,

    /// Log level (overrides the config file; RUST_LOG overrides both)
    #[arg(long, env = "AVT_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Transcription backend settings
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionBackendConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

/// Resolved process-wide configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    /// Upload ceiling in bytes
    pub max_upload_bytes: u64,
    pub cache_folder: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub ffmpeg_timeout: Duration,
    pub max_concurrent_ffmpeg: usize,
    pub transcription: TranscriptionBackendConfig,
    pub log_level: String,
}

impl ServiceConfig {
    /// Merge CLI/ENV over TOML over compiled defaults
    pub fn resolve(args: &Args, toml: &TomlConfig) -> Result<Self> {
        let bind_address_text = args
            .bind_address
            .clone()
            .or_else(|| toml.bind_address.clone())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind_address: IpAddr = bind_address_text.parse().map_err(|_| {
            Error::Config(format!("Invalid bind address: {}", bind_address_text))
        })?;

        let port = args.port.or(toml.port).unwrap_or(DEFAULT_PORT);

        let max_upload_mb = args
            .max_upload_mb
            .or(toml.max_upload_mb)
            .unwrap_or(DEFAULT_MAX_UPLOAD_MB);
        if max_upload_mb == 0 {
            return Err(Error::Config("max_upload_mb must be greater than 0".to_string()));
        }

        let cache_folder =
            CacheFolderResolver::new(args.cache_folder.clone(), toml.cache_folder.clone())
                .resolve();

        let ffmpeg_path = args
            .ffmpeg
            .clone()
            .or_else(|| toml.ffmpeg.path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FFMPEG));

        let ffmpeg_timeout_secs = args
            .ffmpeg_timeout_secs
            .or(toml.ffmpeg.timeout_secs)
            .unwrap_or(DEFAULT_FFMPEG_TIMEOUT_SECS);

        let max_concurrent_ffmpeg = args
            .max_concurrent_ffmpeg
            .or(toml.ffmpeg.max_concurrent)
            .unwrap_or(DEFAULT_MAX_CONCURRENT_FFMPEG);
        if max_concurrent_ffmpeg == 0 {
            return Err(Error::Config(
                "max_concurrent_ffmpeg must be at least 1".to_string(),
            ));
        }

        let base_url = args
            .transcription_url
            .clone()
            .or_else(|| toml.transcription.base_url.clone())
            .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_URL.to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Transcription URL must be http(s): {}",
                base_url
            )));
        }

        let api_key = args
            .transcription_api_key
            .clone()
            .or_else(|| toml.transcription.api_key.clone())
            .filter(|key| !key.trim().is_empty());

        let model = args
            .transcription_model
            .clone()
            .or_else(|| toml.transcription.model.clone())
            .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string());

        let transcription_timeout_secs = args
            .transcription_timeout_secs
            .or(toml.transcription.timeout_secs)
            .unwrap_or(DEFAULT_TRANSCRIPTION_TIMEOUT_SECS);

        let log_level = args
            .log_level
            .clone()
            .unwrap_or_else(|| toml.logging.level.clone());

        Ok(Self {
            bind_address,
            port,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            cache_folder,
            ffmpeg_path,
            ffmpeg_timeout: Duration::from_secs(ffmpeg_timeout_secs),
            max_concurrent_ffmpeg,
            transcription: TranscriptionBackendConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
                model,
                timeout: Duration::from_secs(transcription_timeout_secs),
            },
            log_level,
        })
    }

    /// Compiled defaults rooted at `cache_folder`, for tests and embedding
    pub fn with_cache_folder(cache_folder: PathBuf) -> Self {
        Self {
            bind_address: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            cache_folder,
            ffmpeg_path: PathBuf::from(DEFAULT_FFMPEG),
            ffmpeg_timeout: Duration::from_secs(DEFAULT_FFMPEG_TIMEOUT_SECS),
            max_concurrent_ffmpeg: DEFAULT_MAX_CONCURRENT_FFMPEG,
            transcription: TranscriptionBackendConfig {
                base_url: DEFAULT_TRANSCRIPTION_URL.to_string(),
                api_key: None,
                model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
                timeout: Duration::from_secs(DEFAULT_TRANSCRIPTION_TIMEOUT_SECS),
            },
            log_level: "info".to_string(),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}
