//! Configuration loading
//!
//! Configuration comes from a single TOML file. Every key is optional and
//! falls back to a built-in default, so a missing default-location file is
//! not an error.
//!
//! # Resolution priority
//!
//! 1. Explicit path (command-line `--config`)
//! 2. Environment variable `KINEMA_CONFIG`
//! 3. Platform config directory (`~/.config/kinema/config.toml` on Linux)
//! 4. Built-in defaults
//!
//! An explicitly named file (1 or 2) must exist and parse. The platform file
//! (3) is only read when present.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable naming a configuration file
pub const CONFIG_ENV_VAR: &str = "KINEMA_CONFIG";

/// Top-level configuration file contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinemaConfig {
    /// Decode/playback tuning
    pub playback: PlaybackConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Decode and pacing parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Target number of queued packets per sink before the decode thread
    /// stops producing
    pub queue_depth: usize,

    /// Decode thread sleep between fullness checks when every sink is full
    /// or the stream is draining
    pub decode_idle_ms: u64,

    /// Poll interval of a blocking audio pull while its queue is empty
    pub audio_poll_ms: u64,

    /// Default audio offset correction for newly attached audio sinks
    pub audio_offset_correction_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            queue_depth: 5,
            decode_idle_ms: 5,
            audio_poll_ms: 3,
            audio_offset_correction_ms: 300,
        }
    }
}

impl PlaybackConfig {
    pub fn decode_idle(&self) -> Duration {
        Duration::from_millis(self.decode_idle_ms)
    }

    pub fn audio_poll(&self) -> Duration {
        Duration::from_millis(self.audio_poll_ms)
    }

    pub fn audio_offset_correction(&self) -> Duration {
        Duration::from_millis(self.audio_offset_correction_ms)
    }

    /// Reject values that would stall or busy-spin the decode thread
    pub fn validate(&self) -> Result<()> {
        if self.queue_depth == 0 {
            return Err(Error::Config("playback.queue_depth must be at least 1".to_string()));
        }
        if self.decode_idle_ms == 0 {
            return Err(Error::Config("playback.decode_idle_ms must be at least 1".to_string()));
        }
        if self.audio_poll_ms == 0 {
            return Err(Error::Config("playback.audio_poll_ms must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides it
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl KinemaConfig {
    /// Parse and validate configuration text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: KinemaConfig =
            toml::from_str(text).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file that must exist
    pub fn load_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve configuration following the documented priority order
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        // Priority 1: explicit path
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        // Priority 2: environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return Self::load_file(Path::new(&path));
            }
        }

        // Priority 3: platform config directory, only if present
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_file(&path);
            }
            debug!("No config file at {}, using built-in defaults", path.display());
        }

        // Priority 4: built-in defaults
        Ok(Self::default())
    }

    /// Platform-specific default configuration file location
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("kinema").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        self.playback.validate()
    }
}
