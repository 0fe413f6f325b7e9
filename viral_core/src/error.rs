//! Error types for the growth engine.

use thiserror::Error;
use viral_env::UserId;

/// Errors raised by configuration, preconditions and graph invariant checks.
///
/// Lookups against unknown users are not errors; they resolve to empty or
/// identity results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GrowthError {
    /// A configuration field failed its range constraint
    #[error("Invalid config: {field} = {value} ({reason})")]
    InvalidConfig {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    /// Batch inputs were not parallel arrays
    #[error("Length mismatch: {referrers} referrers but {counts} invitation counts")]
    LengthMismatch { referrers: usize, counts: usize },

    /// An argument was outside its accepted range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The user already has an incoming referral edge
    #[error("Duplicate referral: {user} was already referred")]
    DuplicateReferral { user: UserId },

    /// The edge disagrees with the node's recorded referrer
    #[error("Referrer mismatch for {user}: node says {expected:?}, edge says {actual}")]
    ReferrerMismatch {
        user: UserId,
        expected: Option<UserId>,
        actual: UserId,
    },

    /// A user cannot refer themselves
    #[error("Self referral: {user}")]
    SelfReferral { user: UserId },

    /// Config JSON could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(String),
}

impl GrowthError {
    /// Creates an invalid-config error.
    pub fn invalid_config(field: &'static str, value: impl std::fmt::Display, reason: &'static str) -> Self {
        Self::InvalidConfig {
            field,
            value: value.to_string(),
            reason,
        }
    }

    /// Creates an invalid-argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Result alias used across the engine.
pub type GrowthResult<T> = Result<T, GrowthError>;
