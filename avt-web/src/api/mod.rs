//! HTTP API handlers for avt-web

pub mod cache;
pub mod downloads;
pub mod health;
pub mod limits;
pub mod media;
pub mod sse;
pub mod transcribe;
pub mod transcripts;
pub mod ui;

pub use cache::cache_routes;
pub use health::health_routes;
pub use limits::{upload_body_limit, upload_limit_middleware};
pub use media::{media_routes, upload_media};
pub use sse::event_stream;
pub use transcribe::transcribe_upload;
pub use transcripts::transcript_routes;
pub use ui::ui_routes;
