//! Network configuration for the referral engine.
//!
//! [`NetworkConfig`] is an immutable, validated parameter bundle. It can only
//! be obtained through [`NetworkConfigBuilder::build`], `Default`, or
//! deserialization, all of which run [`NetworkConfig::validate`]. An invalid
//! configuration never produces a value.

use crate::error::{GrowthError, GrowthResult};
use crate::graph::Channel;
use serde::{Deserialize, Serialize};

/// Tolerance for the channel weights summing to one.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Relative weights used to pick the channel of each invitation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelWeights {
    pub email: f64,
    pub social: f64,
    pub link: f64,
    pub in_app: f64,
}

impl Default for ChannelWeights {
    fn default() -> Self {
        Self {
            email: 0.4,
            social: 0.3,
            link: 0.2,
            in_app: 0.1,
        }
    }
}

impl ChannelWeights {
    /// Weights in scan order for cumulative-probability selection.
    pub fn entries(&self) -> [(Channel, f64); 4] {
        [
            (Channel::Email, self.email),
            (Channel::Social, self.social),
            (Channel::Link, self.link),
            (Channel::InApp, self.in_app),
        ]
    }

    fn validate(&self) -> GrowthResult<()> {
        check_fraction("channel_weights.email", self.email)?;
        check_fraction("channel_weights.social", self.social)?;
        check_fraction("channel_weights.link", self.link)?;
        check_fraction("channel_weights.in_app", self.in_app)?;

        let sum: f64 = self.entries().iter().map(|(_, w)| w).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(GrowthError::invalid_config(
                "channel_weights",
                sum,
                "weights must sum to 1",
            ));
        }
        Ok(())
    }
}

/// Validated parameters for referral behaviour, acceptance and churn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NetworkConfigBuilder")]
pub struct NetworkConfig {
    base_referral_probability: f64,
    delight_threshold: f64,
    base_acceptance_rate: f64,
    social_proof_multiplier: f64,
    avg_time_to_first_referral_days: f64,
    time_to_first_referral_stddev_days: f64,
    max_referrals_per_user: u32,
    daily_churn_rate: f64,
    network_churn_reduction: f64,
    enable_network_effects: bool,
    random_seed: Option<u64>,
    channel_weights: ChannelWeights,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_referral_probability: 0.05,
            delight_threshold: 0.7,
            base_acceptance_rate: 0.25,
            social_proof_multiplier: 1.5,
            avg_time_to_first_referral_days: 7.0,
            time_to_first_referral_stddev_days: 3.0,
            max_referrals_per_user: 10,
            daily_churn_rate: 0.01,
            network_churn_reduction: 0.3,
            enable_network_effects: true,
            random_seed: None,
            channel_weights: ChannelWeights::default(),
        }
    }
}

impl NetworkConfig {
    /// Starts a builder with every field unset (defaults apply on build).
    pub fn builder() -> NetworkConfigBuilder {
        NetworkConfigBuilder::default()
    }

    /// A builder pre-filled with this configuration, for deriving variants.
    pub fn to_builder(&self) -> NetworkConfigBuilder {
        NetworkConfigBuilder {
            base_referral_probability: Some(self.base_referral_probability),
            delight_threshold: Some(self.delight_threshold),
            base_acceptance_rate: Some(self.base_acceptance_rate),
            social_proof_multiplier: Some(self.social_proof_multiplier),
            avg_time_to_first_referral_days: Some(self.avg_time_to_first_referral_days),
            time_to_first_referral_stddev_days: Some(self.time_to_first_referral_stddev_days),
            max_referrals_per_user: Some(self.max_referrals_per_user),
            daily_churn_rate: Some(self.daily_churn_rate),
            network_churn_reduction: Some(self.network_churn_reduction),
            enable_network_effects: Some(self.enable_network_effects),
            random_seed: self.random_seed,
            channel_weights: Some(self.channel_weights),
        }
    }

    /// Parses a JSON record; missing fields take defaults.
    pub fn from_json_str(json: &str) -> GrowthResult<Self> {
        let builder: NetworkConfigBuilder =
            serde_json::from_str(json).map_err(|e| GrowthError::ConfigParse(e.to_string()))?;
        builder.build()
    }

    /// Checks every field against its declared range.
    pub fn validate(&self) -> GrowthResult<()> {
        check_fraction("base_referral_probability", self.base_referral_probability)?;
        check_fraction("delight_threshold", self.delight_threshold)?;
        check_fraction("base_acceptance_rate", self.base_acceptance_rate)?;
        check_non_negative("social_proof_multiplier", self.social_proof_multiplier)?;
        check_non_negative("avg_time_to_first_referral_days", self.avg_time_to_first_referral_days)?;
        check_non_negative(
            "time_to_first_referral_stddev_days",
            self.time_to_first_referral_stddev_days,
        )?;
        check_fraction("daily_churn_rate", self.daily_churn_rate)?;
        check_fraction("network_churn_reduction", self.network_churn_reduction)?;
        self.channel_weights.validate()
    }

    pub fn base_referral_probability(&self) -> f64 {
        self.base_referral_probability
    }

    pub fn delight_threshold(&self) -> f64 {
        self.delight_threshold
    }

    pub fn base_acceptance_rate(&self) -> f64 {
        self.base_acceptance_rate
    }

    pub fn social_proof_multiplier(&self) -> f64 {
        self.social_proof_multiplier
    }

    pub fn avg_time_to_first_referral_days(&self) -> f64 {
        self.avg_time_to_first_referral_days
    }

    pub fn time_to_first_referral_stddev_days(&self) -> f64 {
        self.time_to_first_referral_stddev_days
    }

    pub fn max_referrals_per_user(&self) -> u32 {
        self.max_referrals_per_user
    }

    pub fn daily_churn_rate(&self) -> f64 {
        self.daily_churn_rate
    }

    pub fn network_churn_reduction(&self) -> f64 {
        self.network_churn_reduction
    }

    pub fn enable_network_effects(&self) -> bool {
        self.enable_network_effects
    }

    pub fn random_seed(&self) -> Option<u64> {
        self.random_seed
    }

    pub fn channel_weights(&self) -> &ChannelWeights {
        &self.channel_weights
    }
}

/// Builder for [`NetworkConfig`].
///
/// Unset fields fall back to `NetworkConfig::default()`; `build` then runs
/// full validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfigBuilder {
    base_referral_probability: Option<f64>,
    delight_threshold: Option<f64>,
    base_acceptance_rate: Option<f64>,
    social_proof_multiplier: Option<f64>,
    avg_time_to_first_referral_days: Option<f64>,
    time_to_first_referral_stddev_days: Option<f64>,
    max_referrals_per_user: Option<u32>,
    daily_churn_rate: Option<f64>,
    network_churn_reduction: Option<f64>,
    enable_network_effects: Option<bool>,
    random_seed: Option<u64>,
    channel_weights: Option<ChannelWeights>,
}

impl NetworkConfigBuilder {
    pub fn base_referral_probability(mut self, value: f64) -> Self {
        self.base_referral_probability = Some(value);
        self
    }

    pub fn delight_threshold(mut self, value: f64) -> Self {
        self.delight_threshold = Some(value);
        self
    }

    pub fn base_acceptance_rate(mut self, value: f64) -> Self {
        self.base_acceptance_rate = Some(value);
        self
    }

    pub fn social_proof_multiplier(mut self, value: f64) -> Self {
        self.social_proof_multiplier = Some(value);
        self
    }

    pub fn avg_time_to_first_referral_days(mut self, value: f64) -> Self {
        self.avg_time_to_first_referral_days = Some(value);
        self
    }

    pub fn time_to_first_referral_stddev_days(mut self, value: f64) -> Self {
        self.time_to_first_referral_stddev_days = Some(value);
        self
    }

    pub fn max_referrals_per_user(mut self, value: u32) -> Self {
        self.max_referrals_per_user = Some(value);
        self
    }

    pub fn daily_churn_rate(mut self, value: f64) -> Self {
        self.daily_churn_rate = Some(value);
        self
    }

    pub fn network_churn_reduction(mut self, value: f64) -> Self {
        self.network_churn_reduction = Some(value);
        self
    }

    pub fn enable_network_effects(mut self, value: bool) -> Self {
        self.enable_network_effects = Some(value);
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn channel_weights(mut self, weights: ChannelWeights) -> Self {
        self.channel_weights = Some(weights);
        self
    }

    /// Fills defaults and validates.
    pub fn build(self) -> GrowthResult<NetworkConfig> {
        let defaults = NetworkConfig::default();
        let config = NetworkConfig {
            base_referral_probability: self
                .base_referral_probability
                .unwrap_or(defaults.base_referral_probability),
            delight_threshold: self.delight_threshold.unwrap_or(defaults.delight_threshold),
            base_acceptance_rate: self.base_acceptance_rate.unwrap_or(defaults.base_acceptance_rate),
            social_proof_multiplier: self
                .social_proof_multiplier
                .unwrap_or(defaults.social_proof_multiplier),
            avg_time_to_first_referral_days: self
                .avg_time_to_first_referral_days
                .unwrap_or(defaults.avg_time_to_first_referral_days),
            time_to_first_referral_stddev_days: self
                .time_to_first_referral_stddev_days
                .unwrap_or(defaults.time_to_first_referral_stddev_days),
            max_referrals_per_user: self
                .max_referrals_per_user
                .unwrap_or(defaults.max_referrals_per_user),
            daily_churn_rate: self.daily_churn_rate.unwrap_or(defaults.daily_churn_rate),
            network_churn_reduction: self
                .network_churn_reduction
                .unwrap_or(defaults.network_churn_reduction),
            enable_network_effects: self
                .enable_network_effects
                .unwrap_or(defaults.enable_network_effects),
            random_seed: self.random_seed.or(defaults.random_seed),
            channel_weights: self.channel_weights.unwrap_or(defaults.channel_weights),
        };
        config.validate()?;
        Ok(config)
    }
}

impl TryFrom<NetworkConfigBuilder> for NetworkConfig {
    type Error = GrowthError;

    fn try_from(builder: NetworkConfigBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

fn check_fraction(field: &'static str, value: f64) -> GrowthResult<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(GrowthError::invalid_config(field, value, "must be within [0, 1]"));
    }
    Ok(())
}

fn check_non_negative(field: &'static str, value: f64) -> GrowthResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(GrowthError::invalid_config(field, value, "must be finite and >= 0"));
    }
    Ok(())
}
