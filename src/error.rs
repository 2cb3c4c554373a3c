//! Library error type

use thiserror::Error;

/// Errors surfaced by the timer core and its storage backends
#[derive(Debug, Error)]
pub enum TimerError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode stored value: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, TimerError>;
