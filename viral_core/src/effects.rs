//! Pluggable growth effect multipliers.
//!
//! Each effect is a pure function of the current graph and metrics returning
//! a scalar adjustment. Effects are optional; the engine works without any.

use crate::config::NetworkConfig;
use crate::graph::ReferralGraph;
use crate::metrics::NetworkMetrics;
use std::collections::BTreeMap;

/// A side-effect-free scalar adjustment derived from the network.
pub trait GrowthEffect: Send + Sync {
    /// Stable name used in reports.
    fn name(&self) -> &'static str;

    fn multiplier(&self, graph: &ReferralGraph, metrics: &NetworkMetrics) -> f64;
}

/// Acceptance boost from a visibly large network.
pub struct SocialProofEffect {
    pub social_proof_multiplier: f64,
}

impl GrowthEffect for SocialProofEffect {
    fn name(&self) -> &'static str {
        "social_proof"
    }

    fn multiplier(&self, graph: &ReferralGraph, _metrics: &NetworkMetrics) -> f64 {
        let factor = (graph.total_users().max(1) as f64).log10() / 5.0;
        (1.0 + factor * (self.social_proof_multiplier - 1.0)).max(0.0)
    }
}

/// Per-user share of the damped Metcalfe network value.
pub struct NetworkValueEffect;

impl GrowthEffect for NetworkValueEffect {
    fn name(&self) -> &'static str {
        "network_value"
    }

    fn multiplier(&self, _graph: &ReferralGraph, metrics: &NetworkMetrics) -> f64 {
        if metrics.total_users == 0 {
            return 1.0;
        }
        (metrics.network_value_multiplier / metrics.total_users as f64).max(1.0)
    }
}

/// Scale applied to churn: users embedded through referrals leave less often.
pub struct ChurnReductionEffect {
    pub network_churn_reduction: f64,
}

impl GrowthEffect for ChurnReductionEffect {
    fn name(&self) -> &'static str {
        "churn_reduction"
    }

    fn multiplier(&self, graph: &ReferralGraph, _metrics: &NetworkMetrics) -> f64 {
        if graph.is_empty() {
            return 1.0;
        }
        let referred_share = graph.referred_users() as f64 / graph.total_users() as f64;
        (1.0 - self.network_churn_reduction * referred_share).clamp(0.0, 1.0)
    }
}

/// An ordered collection of effects.
#[derive(Default)]
pub struct EffectSet {
    effects: Vec<Box<dyn GrowthEffect>>,
}

impl EffectSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three stock effects, parameterised from `config`.
    ///
    /// With network effects disabled only churn reduction is included.
    pub fn from_config(config: &NetworkConfig) -> Self {
        let mut set = Self::new();
        if config.enable_network_effects() {
            set.push(SocialProofEffect {
                social_proof_multiplier: config.social_proof_multiplier(),
            });
            set.push(NetworkValueEffect);
        }
        set.push(ChurnReductionEffect {
            network_churn_reduction: config.network_churn_reduction(),
        });
        set
    }

    pub fn push(&mut self, effect: impl GrowthEffect + 'static) {
        self.effects.push(Box::new(effect));
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Evaluates every effect by name.
    pub fn evaluate(&self, graph: &ReferralGraph, metrics: &NetworkMetrics) -> BTreeMap<&'static str, f64> {
        self.effects
            .iter()
            .map(|effect| (effect.name(), effect.multiplier(graph, metrics)))
            .collect()
    }

    /// Multiplier of the named effect, or 1 if absent.
    pub fn multiplier_of(&self, name: &str, graph: &ReferralGraph, metrics: &NetworkMetrics) -> f64 {
        self.effects
            .iter()
            .find(|effect| effect.name() == name)
            .map(|effect| effect.multiplier(graph, metrics))
            .unwrap_or(1.0)
    }
}
