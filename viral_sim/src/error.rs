//! Harness error types.

use thiserror::Error;
use viral_core::GrowthError;

/// Errors surfaced by the simulation harness.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Engine error: {0}")]
    Growth(#[from] GrowthError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid timing distribution: {0}")]
    Timing(String),
}

pub type SimResult<T> = Result<T, SimError>;
