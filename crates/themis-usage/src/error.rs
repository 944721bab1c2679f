//! Error types for themis-usage

use thiserror::Error;

/// Usage pipeline error type
#[derive(Debug, Error)]
pub enum Error {
    /// Event payload failed validation
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Storage I/O error (file backend)
    #[error("storage io error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Storage operation exceeded its deadline
    #[error("storage operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
