//! Error types for parley

use thiserror::Error;

/// The main error type for parley operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Storage write failures, including capacity overflow
    #[error("Storage error: {0}")]
    Storage(String),

    /// The referenced session does not exist
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    /// Attempted to delete the only remaining session
    #[error("You need at least one chat.")]
    LastSession,

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// A specialized Result type for parley operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// Whether the error is a normal, user-facing condition rather than a failure
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::LastSession | Error::UnknownSession(_))
    }
}
