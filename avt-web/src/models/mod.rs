//! Data models for avt-web
//!
//! One upload flows through a strict chain:
//! [`UploadedMedia`] → [`NormalizedAudio`] → [`Transcript`].

pub mod audio;
pub mod caption_style;
pub mod media;
pub mod transcript;

pub use audio::NormalizedAudio;
pub use caption_style::{BackgroundMode, CaptionStyle, OutputScale};
pub use media::{Container, UploadedMedia};
pub use transcript::{
    RawSegment, RawTranscription, Segment, Task, Transcript, TranscriptionOptions,
};
