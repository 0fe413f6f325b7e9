//! Named growth scenarios for the simulation harness.

use serde::Serialize;
use viral_core::NetworkConfigBuilder;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// Default configuration
    Baseline,

    /// Eager referrers, strong social proof
    ViralLoop,

    /// Heavy daily churn
    ChurnStorm,

    /// Rare referrals, long cycle times
    SlowBurn,

    /// Network effects disabled
    NoNetworkEffects,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Baseline,
            ScenarioId::ViralLoop,
            ScenarioId::ChurnStorm,
            ScenarioId::SlowBurn,
            ScenarioId::NoNetworkEffects,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::ViralLoop => "viral_loop",
            ScenarioId::ChurnStorm => "churn_storm",
            ScenarioId::SlowBurn => "slow_burn",
            ScenarioId::NoNetworkEffects => "no_network_effects",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "Default parameters, sanity check of every invariant",
            ScenarioId::ViralLoop => "60% referral probability, 2x social proof: referrals must land",
            ScenarioId::ChurnStorm => "20% daily churn: churned users must show up in metrics",
            ScenarioId::SlowBurn => "2% referral probability, ~14 day cycles",
            ScenarioId::NoNetworkEffects => "Acceptance must stay at the base rate regardless of size",
        }
    }

    /// Applies this scenario's overrides on top of `base`.
    pub fn configure(&self, base: NetworkConfigBuilder) -> NetworkConfigBuilder {
        match self {
            ScenarioId::Baseline => base,
            ScenarioId::ViralLoop => base
                .base_referral_probability(0.6)
                .base_acceptance_rate(0.5)
                .social_proof_multiplier(2.0)
                .max_referrals_per_user(5),
            ScenarioId::ChurnStorm => base.daily_churn_rate(0.2).network_churn_reduction(0.1),
            ScenarioId::SlowBurn => base
                .base_referral_probability(0.02)
                .base_acceptance_rate(0.1)
                .avg_time_to_first_referral_days(14.0)
                .time_to_first_referral_stddev_days(5.0),
            ScenarioId::NoNetworkEffects => base.enable_network_effects(false),
        }
    }

    /// Returns true if this scenario is meant to shrink the network.
    pub fn is_adverse(&self) -> bool {
        matches!(self, ScenarioId::ChurnStorm)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "baseline" | "default" => Ok(ScenarioId::Baseline),
            "viral_loop" | "viralloop" | "viral" => Ok(ScenarioId::ViralLoop),
            "churn_storm" | "churnstorm" | "churn" => Ok(ScenarioId::ChurnStorm),
            "slow_burn" | "slowburn" => Ok(ScenarioId::SlowBurn),
            "no_network_effects" | "nonetworkeffects" | "flat" => Ok(ScenarioId::NoNetworkEffects),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
