//! avt-web - AI Video Transcriber service
//!
//! Accepts video uploads, extracts the audio track with ffmpeg, sends it to
//! an OpenAI-compatible transcription backend and serves the transcript as
//! JSON, plain text or SubRip subtitles.
//!
//! Startup order: configuration, logging, cache folder, ffmpeg probe, then
//! bind. Any failure before bind exits non-zero.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avt_common::config::{load_toml_config, CacheFolderInitializer, LoadedConfig};
use avt_common::events::EventBus;
use avt_web::config::{Args, ServiceConfig};
use avt_web::services::{Ffmpeg, WhisperApiTranscriber};
use avt_web::{build_router, AppState};

/// Capacity of the progress event channel
const EVENT_BUS_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let loaded = load_toml_config(args.config.as_deref());

    // Level from CLI/ENV, then the config file; RUST_LOG overrides both
    let level = args
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|l| l.config.logging.level.clone()))
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("avt_web={0},avt_common={0},tower_http={0}", level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting avt-web (AI Video Transcriber) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );

    if let Err(e) = run(args, loaded).await {
        error!("Startup failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(args: Args, loaded: avt_common::Result<LoadedConfig>) -> Result<()> {
    let loaded = loaded.context("Failed to load configuration file")?;
    match &loaded.source {
        Some(path) => info!("Configuration file: {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }

    let config = ServiceConfig::resolve(&args, &loaded.config).context("Invalid configuration")?;

    // Step 1: Cache folder must exist and be writable
    let initializer = CacheFolderInitializer::new(config.cache_folder.clone());
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize cache folder")?;
    info!("Cache folder: {}", initializer.cache_folder().display());

    // Step 2: ffmpeg must be runnable before we accept uploads
    let ffmpeg = Ffmpeg::from_config(&config);
    let ffmpeg_version = ffmpeg
        .probe_version()
        .await
        .context("ffmpeg is required but could not be run")?;
    info!(
        "ffmpeg: {} (timeout {}s, max {} concurrent)",
        ffmpeg_version,
        config.ffmpeg_timeout.as_secs(),
        config.max_concurrent_ffmpeg
    );

    // Step 3: Transcription backend client
    let transcriber = WhisperApiTranscriber::new(&config.transcription)
        .context("Failed to create transcription client")?;
    info!(
        "Transcription backend: {} (model {}, timeout {}s)",
        config.transcription.base_url,
        config.transcription.model,
        config.transcription.timeout.as_secs()
    );
    info!("Upload limit: {} bytes", config.max_upload_bytes);

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let addr = config.socket_addr();

    let ffmpeg = Arc::new(ffmpeg);
    let state = AppState::new(
        config,
        ffmpeg.clone(),
        ffmpeg,
        Arc::new(transcriber),
        event_bus,
    )
    .with_ffmpeg_version(ffmpeg_version);

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
