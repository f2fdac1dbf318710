//! avt-web library interface
//!
//! Exposes the router and application state so integration tests can drive
//! the service with fake media tools.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use avt_common::events::EventBus;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::services::{
    IngestionGate, MediaActions, MediaRenderer, MediaStore, Normalizer, Transcriber,
    TranscriptionPipeline,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub store: MediaStore,
    pub normalizer: Arc<dyn Normalizer>,
    pub renderer: Arc<dyn MediaRenderer>,
    pub transcriber: Arc<dyn Transcriber>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// `ffmpeg -version` banner, when probed
    pub ffmpeg_version: Option<String>,
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        normalizer: Arc<dyn Normalizer>,
        renderer: Arc<dyn MediaRenderer>,
        transcriber: Arc<dyn Transcriber>,
        event_bus: EventBus,
    ) -> Self {
        let store = MediaStore::new(config.cache_folder.clone());
        Self {
            config: Arc::new(config),
            store,
            normalizer,
            renderer,
            transcriber,
            event_bus,
            startup_time: avt_common::time::now(),
            ffmpeg_version: None,
        }
    }

    pub fn with_ffmpeg_version(mut self, version: String) -> Self {
        self.ffmpeg_version = Some(version);
        self
    }

    pub fn ingestion_gate(&self) -> IngestionGate<'_> {
        IngestionGate::new(&self.store, &self.event_bus, self.config.max_upload_bytes)
    }

    pub fn pipeline(&self) -> TranscriptionPipeline {
        TranscriptionPipeline::new(
            self.normalizer.clone(),
            self.transcriber.clone(),
            self.store.clone(),
            self.event_bus.clone(),
            self.config.transcription.model.clone(),
        )
    }

    pub fn media_actions(&self) -> MediaActions {
        MediaActions::new(
            self.renderer.clone(),
            self.store.clone(),
            self.event_bus.clone(),
        )
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let body_limit = usize::try_from(api::upload_body_limit(state.config.max_upload_bytes))
        .unwrap_or(usize::MAX);

    // Upload routes: declared length checked first, then the streaming cap
    let uploads = Router::new()
        .route("/api/transcribe", post(api::transcribe_upload))
        .route("/api/media", post(api::upload_media))
        .layer(DefaultBodyLimit::max(body_limit))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::upload_limit_middleware,
        ));

    Router::new()
        // UI routes (HTML pages)
        .merge(api::ui_routes())
        // API routes
        .merge(uploads)
        .merge(api::media_routes())
        .merge(api::transcript_routes())
        .merge(api::cache_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
