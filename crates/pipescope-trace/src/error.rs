//! Error types for pipescope-trace
//!
//! Only the edges that touch a run source can fail. Event processing,
//! critical path analysis and replay degrade to empty results instead.

use thiserror::Error;

/// Trace error type
#[derive(Debug, Error)]
pub enum Error {
    /// Run not found
    #[error("run not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error while reading a run source
    #[error("io error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
