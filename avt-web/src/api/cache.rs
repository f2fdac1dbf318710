//! Server cache management

use axum::{extract::State, routing::delete, Json, Router};
use serde::Serialize;
use tracing::{debug, info};

use avt_common::events::PipelineEvent;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub removed_entries: usize,
}

/// DELETE /api/cache
///
/// Removes every stored upload, derived media file and transcript.
pub async fn clear_cache(State(state): State<AppState>) -> ApiResult<Json<ClearCacheResponse>> {
    let removed_entries = state.store.clear().await?;
    info!(
        removed_entries,
        cache_folder = %state.store.root().display(),
        "Server cache cleared on request"
    );

    match state.event_bus.emit(PipelineEvent::CacheCleared {
        removed_entries,
        timestamp: avt_common::time::now(),
    }) {
        Ok(subscribers) => debug!(subscribers, "Cache clear broadcast"),
        Err(_) => debug!("Cache cleared with no event subscribers"),
    }

    Ok(Json(ClearCacheResponse { removed_entries }))
}

pub fn cache_routes() -> Router<AppState> {
    Router::new().route("/api/cache", delete(clear_cache))
}
