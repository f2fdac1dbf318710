//! # AVT Common Library
//!
//! Shared code for the AI Video Transcriber service including:
//! - Error types
//! - TOML configuration file model and cache folder resolution
//! - Pipeline event types and the broadcast event bus
//! - Timestamp formatting for subtitle output

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
