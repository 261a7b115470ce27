//! Error types for Lantern

use thiserror::Error;

/// Core error type for Lantern operations
#[derive(Error, Debug)]
pub enum LanternError {
    /// The polling loop ran past its wall-clock budget
    #[error("Query timed out after {elapsed_ms}ms")]
    QueryTimeout { elapsed_ms: u64 },

    /// Failure reported by the remote statement handle while starting or advancing
    #[error("Remote protocol error: {0}")]
    Protocol(String),

    #[error("Background load failed: {0}")]
    BackgroundLoad(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl LanternError {
    /// Whether this error is a polling timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, LanternError::QueryTimeout { .. })
    }

    /// Elapsed time carried by a timeout, if this is one
    pub fn elapsed_ms(&self) -> Option<u64> {
        match self {
            LanternError::QueryTimeout { elapsed_ms } => Some(*elapsed_ms),
            _ => None,
        }
    }
}

/// Result type alias for Lantern operations
pub type Result<T> = std::result::Result<T, LanternError>;
