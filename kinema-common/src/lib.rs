//! # Kinema Common Library
//!
//! Shared code for the kinema playback crates:
//! - Playback state enumeration shared by sources and sinks
//! - Configuration loading (TOML file, environment, built-in defaults)
//! - Common error type
//! - Duration helpers for frame and sample arithmetic

pub mod config;
pub mod error;
pub mod state;
pub mod time;

pub use config::{KinemaConfig, LoggingConfig, PlaybackConfig};
pub use error::{Error, Result};
pub use state::PlaybackState;
