//! Error types for the monitor engine.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for engine operations.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Subscribe to {pattern:?} failed: {reason}")]
    Subscribe { pattern: String, reason: String },

    #[error("Bus connection is closed")]
    BusClosed,

    #[error("Invalid subject: {0:?}")]
    InvalidSubject(String),

    #[error("Discovery already started")]
    AlreadyStarted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error in {path:?}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for MonitorError {
    fn from(e: serde_json::Error) -> Self {
        MonitorError::Serialization(e.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, MonitorError>;
