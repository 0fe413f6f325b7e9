//! Common types shared by the engine and its hosts.

use crate::error::EnvError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds in one day.
pub const MILLIS_PER_DAY: u64 = 86_400_000;

/// Unique identifier for a user in the referral graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a UserId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for UserId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point in time, in milliseconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The UNIX epoch.
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Creates a timestamp from milliseconds since the epoch.
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Creates a timestamp a whole number of days after the epoch.
    pub fn from_days(days: u64) -> Self {
        Self(days.saturating_mul(MILLIS_PER_DAY))
    }

    /// Milliseconds since the epoch.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Returns this timestamp shifted forward by `duration`.
    pub fn advance(&self, duration: Duration) -> Self {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(ms))
    }

    /// Returns this timestamp shifted forward by a fractional number of days.
    ///
    /// Negative or non-finite inputs leave the timestamp unchanged.
    pub fn plus_days(&self, days: f64) -> Self {
        if !days.is_finite() || days <= 0.0 {
            return *self;
        }
        let ms = (days * MILLIS_PER_DAY as f64).round() as u64;
        Self(self.0.saturating_add(ms))
    }

    /// Signed number of days from `earlier` to `self`.
    pub fn days_since(&self, earlier: Timestamp) -> f64 {
        (self.0 as f64 - earlier.0 as f64) / MILLIS_PER_DAY as f64
    }
}

impl TryFrom<SystemTime> for Timestamp {
    type Error = EnvError;

    fn try_from(time: SystemTime) -> Result<Self, Self::Error> {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(|e| EnvError::clock(e.to_string()))?;
        let ms = u64::try_from(since_epoch.as_millis())
            .map_err(|e| EnvError::TimestampOutOfRange(e.to_string()))?;
        Ok(Self(ms))
    }
}

impl From<Timestamp> for SystemTime {
    fn from(ts: Timestamp) -> Self {
        UNIX_EPOCH + Duration::from_millis(ts.0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
