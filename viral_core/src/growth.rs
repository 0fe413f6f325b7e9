//! Multi-day growth projection.
//!
//! A discrete day-by-day extrapolation from a starting population:
//!
//! ```text
//! sent     = floor(users * k)
//! accepted = floor(sent * conversion)
//! churned  = floor(users * churn)
//! next     = max(0, users + accepted - churned)
//! ```
//!
//! The resulting curve is classified as declining, exponential, plateau or
//! linear, in that order of precedence.

use crate::error::{GrowthError, GrowthResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use viral_env::{EngineContext, Timestamp};

/// Default fraction of sent referrals that convert.
pub const DEFAULT_CONVERSION_RATE: f64 = 0.1;

/// Default fraction of users lost per day.
pub const DEFAULT_CHURN_RATE: f64 = 0.01;

/// Relative variance below which the tail of the curve counts as flat.
const PLATEAU_VARIANCE_RATIO: f64 = 0.01;

/// Number of trailing days inspected for a plateau.
const PLATEAU_WINDOW: usize = 3;

/// Shape of a projected growth curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthType {
    Exponential,
    Linear,
    Plateau,
    Declining,
}

impl GrowthType {
    pub fn name(&self) -> &'static str {
        match self {
            GrowthType::Exponential => "exponential",
            GrowthType::Linear => "linear",
            GrowthType::Plateau => "plateau",
            GrowthType::Declining => "declining",
        }
    }
}

impl std::fmt::Display for GrowthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One simulated day. `users` is the population at the start of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GrowthDataPoint {
    pub day: u32,
    pub users: u64,
    pub new_users: u64,
    pub churned: u64,
    pub referrals_sent: u64,
    pub referrals_accepted: u64,
}

/// A completed projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthProjection {
    pub starting_users: u64,
    pub k_factor: f64,
    pub conversion_rate: f64,
    pub churn_rate: f64,
    pub days: u32,
    pub data_points: Vec<GrowthDataPoint>,
    /// Population after the last simulated day
    pub final_user_count: u64,
    pub growth_type: GrowthType,
    pub created_at: Timestamp,
}

impl GrowthProjection {
    /// Largest start-of-day population.
    pub fn peak_user_count(&self) -> u64 {
        self.data_points.iter().map(|p| p.users).max().unwrap_or(0)
    }

    /// `(last.users - first.users) / days / first.users`.
    ///
    /// 0 with fewer than two points or when the first day had no users.
    pub fn average_daily_growth_rate(&self) -> f64 {
        let (Some(first), Some(last)) = (self.data_points.first(), self.data_points.last()) else {
            return 0.0;
        };
        if self.data_points.len() < 2 || first.users == 0 {
            return 0.0;
        }
        let total_growth = last.users as f64 - first.users as f64;
        total_growth / self.data_points.len() as f64 / first.users as f64
    }
}

/// Runs growth projections stamped with the context clock.
pub struct GrowthProjector {
    context: Arc<dyn EngineContext>,
}

impl GrowthProjector {
    pub fn new(context: Arc<dyn EngineContext>) -> Self {
        Self { context }
    }

    /// Projects with the default conversion and churn rates.
    pub fn predict_growth(&self, starting_users: u64, k_factor: f64, days: u32) -> GrowthResult<GrowthProjection> {
        self.create_growth_projection(
            starting_users,
            k_factor,
            days,
            DEFAULT_CONVERSION_RATE,
            DEFAULT_CHURN_RATE,
        )
    }

    /// Simulates `days` discrete days forward.
    ///
    /// `days` must be at least 1, `k_factor` finite and non-negative, and both
    /// rates within [0, 1].
    pub fn create_growth_projection(
        &self,
        starting_users: u64,
        k_factor: f64,
        days: u32,
        conversion_rate: f64,
        churn_rate: f64,
    ) -> GrowthResult<GrowthProjection> {
        if days == 0 {
            return Err(GrowthError::invalid_argument("days must be at least 1"));
        }
        if !k_factor.is_finite() || k_factor < 0.0 {
            return Err(GrowthError::invalid_argument(format!("k_factor {} must be finite and >= 0", k_factor)));
        }
        for (name, rate) in [("conversion_rate", conversion_rate), ("churn_rate", churn_rate)] {
            if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
                return Err(GrowthError::invalid_argument(format!("{} {} must be within [0, 1]", name, rate)));
            }
        }

        let mut data_points = Vec::with_capacity(days as usize);
        let mut current_users = starting_users;

        for day in 0..days {
            let referrals_sent = floor_mul(current_users, k_factor);
            let referrals_accepted = floor_mul(referrals_sent, conversion_rate);
            let churned = floor_mul(current_users, churn_rate);
            let new_users = referrals_accepted;

            data_points.push(GrowthDataPoint {
                day,
                users: current_users,
                new_users,
                churned,
                referrals_sent,
                referrals_accepted,
            });

            current_users = current_users.saturating_add(new_users).saturating_sub(churned);
        }

        let growth_type = classify(starting_users, current_users, k_factor, &data_points);
        debug!(
            starting_users,
            final_users = current_users,
            %growth_type,
            "growth projection complete"
        );

        Ok(GrowthProjection {
            starting_users,
            k_factor,
            conversion_rate,
            churn_rate,
            days,
            data_points,
            final_user_count: current_users,
            growth_type,
            created_at: self.context.now(),
        })
    }
}

/// `floor(count * factor)` saturating at `u64::MAX`.
fn floor_mul(count: u64, factor: f64) -> u64 {
    let product = (count as f64 * factor).floor();
    if product >= u64::MAX as f64 {
        u64::MAX
    } else {
        product as u64
    }
}

fn classify(starting_users: u64, final_users: u64, k_factor: f64, points: &[GrowthDataPoint]) -> GrowthType {
    if final_users < starting_users {
        return GrowthType::Declining;
    }
    if k_factor > 1.0 {
        return GrowthType::Exponential;
    }

    let tail = &points[points.len().saturating_sub(PLATEAU_WINDOW)..];
    if !tail.is_empty() {
        let n = tail.len() as f64;
        let mean = tail.iter().map(|p| p.users as f64).sum::<f64>() / n;
        let variance = tail.iter().map(|p| (p.users as f64 - mean).powi(2)).sum::<f64>() / n;
        if variance < PLATEAU_VARIANCE_RATIO * mean {
            return GrowthType::Plateau;
        }
    }
    GrowthType::Linear
}
