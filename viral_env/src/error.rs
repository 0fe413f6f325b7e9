//! Error types for the environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The system clock reports a time before the UNIX epoch
    #[error("Clock error: {0}")]
    ClockError(String),

    /// A timestamp could not be represented
    #[error("Timestamp out of range: {0}")]
    TimestampOutOfRange(String),
}

impl EnvError {
    /// Creates a clock error.
    pub fn clock(msg: impl Into<String>) -> Self {
        Self::ClockError(msg.into())
    }
}
