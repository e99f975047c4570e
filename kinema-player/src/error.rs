//! Error types for kinema-player
//!
//! Control operations on a source (`play`, `pause`, `stop`, `seek`) never
//! fail; they are no-ops when their preconditions are unmet. Errors surface
//! from loading, from the decode collaborator, and from invalid parameters.

use thiserror::Error;

/// Main error type for kinema-player
#[derive(Error, Debug)]
pub enum Error {
    /// Resource could not be opened or has no decodable stream
    #[error("Load error: {0}")]
    Load(String),

    /// A single unit failed to decode or convert (recoverable)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Decoder could not reposition its read cursor
    #[error("Seek error: {0}")]
    Seek(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<kinema_common::Error> for Error {
    fn from(err: kinema_common::Error) -> Self {
        match err {
            kinema_common::Error::Io(e) => Error::Io(e),
            kinema_common::Error::Config(msg) => Error::Config(msg),
            kinema_common::Error::InvalidInput(msg) => Error::InvalidInput(msg),
            kinema_common::Error::Internal(msg) => Error::Internal(msg),
        }
    }
}

/// Convenience Result type using kinema-player Error
pub type Result<T> = std::result::Result<T, Error>;
