//! Services for avt-web
//!
//! Media handling behind the HTTP layer: upload ingestion, the on-disk cache,
//! ffmpeg, the transcription backend and the pipeline tying them together.

pub mod actions;
pub mod ffmpeg;
pub mod ingest;
pub mod pipeline;
pub mod render;
pub mod store;
pub mod transcriber;

pub use actions::{MediaActions, RenderedFile};
pub use ffmpeg::{Ffmpeg, MediaRenderer, Normalizer};
pub use ingest::{IngestedUpload, IngestionGate};
pub use pipeline::{PipelineOutcome, TranscriptionPipeline};
pub use render::{render_srt, render_txt};
pub use store::{MediaLease, MediaStore, Retention, StoredMedia};
pub use transcriber::{Transcriber, WhisperApiTranscriber};
