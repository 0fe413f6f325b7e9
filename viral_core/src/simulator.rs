//! Referral Simulator
//! ==================
//!
//! Orchestrates one simulation pass:
//!
//! 1. Personas join as organic users.
//! 2. The supplied event batch is folded into the graph.
//! 3. Each persona's trigger decision is realised by the invitation
//!    simulator and the accepted invitations are folded in.
//!
//! Users created during a pass are not themselves asked to refer until the
//! host passes them back in as personas on a later call.

use crate::builder::GraphBuilder;
use crate::config::NetworkConfig;
use crate::effects::EffectSet;
use crate::error::GrowthResult;
use crate::event::ReferralEvent;
use crate::graph::ReferralGraph;
use crate::growth::{GrowthProjection, GrowthProjector, DEFAULT_CONVERSION_RATE};
use crate::invitation::InvitationSimulator;
use crate::metrics::{NetworkMetrics, ViralCoefficientCalculator};
use crate::persona::Persona;
use crate::trigger::{BaselineTriggerDetector, TriggerDetector};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use viral_env::EngineContext;

/// Drives personas through trigger, invitation and graph building.
pub struct ReferralSimulator {
    config: NetworkConfig,
    builder: GraphBuilder,
    invitations: InvitationSimulator,
    calculator: ViralCoefficientCalculator,
    projector: GrowthProjector,
    trigger: Box<dyn TriggerDetector>,
    effects: EffectSet,
    total_invitations_sent: usize,
}

impl ReferralSimulator {
    /// Creates a simulator using [`BaselineTriggerDetector`] and the stock effects.
    pub fn new(config: NetworkConfig, context: Arc<dyn EngineContext>) -> Self {
        let trigger = BaselineTriggerDetector::new(&config, context.as_ref());
        Self::with_trigger(config, context, Box::new(trigger))
    }

    /// Creates a simulator with a host-supplied trigger detector.
    pub fn with_trigger(
        config: NetworkConfig,
        context: Arc<dyn EngineContext>,
        trigger: Box<dyn TriggerDetector>,
    ) -> Self {
        Self {
            builder: GraphBuilder::new(context.clone()),
            invitations: InvitationSimulator::new(config.clone(), context.clone()),
            calculator: ViralCoefficientCalculator::new(context.clone()),
            projector: GrowthProjector::new(context),
            effects: EffectSet::from_config(&config),
            trigger,
            config,
            total_invitations_sent: 0,
        }
    }

    /// Replaces the effect set.
    pub fn with_effects(mut self, effects: EffectSet) -> Self {
        self.effects = effects;
        self
    }

    /// Runs one pass and returns a snapshot of the resulting graph.
    pub fn simulate_referrals(&mut self, personas: &[Persona], events: &[ReferralEvent]) -> ReferralGraph {
        let joined = self.builder.add_personas(personas);
        let replayed = self.builder.build_from_events(events);

        let max_referrals = self.config.max_referrals_per_user() as usize;
        let mut sent = 0;
        let mut accepted = 0;

        for persona in personas {
            if self
                .builder
                .graph()
                .node(persona.id.as_str())
                .map_or(false, |node| node.churned)
            {
                continue;
            }

            let recent: Vec<ReferralEvent> = events
                .iter()
                .filter(|e| e.referrer_id == persona.id)
                .cloned()
                .collect();
            let decision = self.trigger.evaluate(persona, &recent);
            if !decision.should_refer || decision.referral_count == 0 {
                continue;
            }

            let count = (decision.referral_count as usize).min(max_referrals);
            let network_size = self.builder.graph().total_users();
            let outcome = self
                .invitations
                .simulate_invitations(&persona.id, count, network_size);

            sent += outcome.invitations_sent;
            accepted += self.builder.build_from_events(&outcome.events);
            debug!(
                user = %persona.id,
                probability = decision.probability,
                sent = outcome.invitations_sent,
                "persona referred"
            );
        }
        self.total_invitations_sent += sent;

        let graph = self.builder.snapshot();
        info!(
            joined,
            replayed,
            sent,
            accepted,
            total_users = graph.total_users(),
            total_referrals = graph.total_referrals(),
            "simulation pass complete"
        );
        graph
    }

    /// k-factor of `graph`.
    pub fn calculate_viral_coefficient(&self, graph: &ReferralGraph) -> f64 {
        self.calculator.calculate_k_factor(graph)
    }

    /// Metrics for `graph`. Without an invitation count, conversion is reported as 0.
    pub fn calculate_metrics(&self, graph: &ReferralGraph, total_invitations_sent: Option<usize>) -> NetworkMetrics {
        self.calculator
            .calculate_metrics(graph, total_invitations_sent.unwrap_or(0))
    }

    /// Metrics for the simulator's own graph and invitation tally.
    pub fn current_metrics(&self) -> NetworkMetrics {
        self.calculate_metrics(self.builder.graph(), Some(self.total_invitations_sent))
    }

    /// Projects growth with the default conversion and churn rates.
    pub fn predict_growth(&self, current_users: u64, k_factor: f64, days: u32) -> GrowthResult<GrowthProjection> {
        self.projector.predict_growth(current_users, k_factor, days)
    }

    /// Projects the simulator's own graph forward.
    ///
    /// Uses the measured k-factor and conversion rate (falling back to the
    /// defaults when nothing was sent) and the configured daily churn scaled by
    /// the churn-reduction effect.
    pub fn project_current_growth(&self, days: u32) -> GrowthResult<GrowthProjection> {
        let graph = self.builder.graph();
        let metrics = self.current_metrics();
        let conversion = if self.total_invitations_sent == 0 {
            DEFAULT_CONVERSION_RATE
        } else {
            metrics.conversion_rate.min(1.0)
        };
        let churn = self.config.daily_churn_rate()
            * self.effects.multiplier_of("churn_reduction", graph, &metrics);

        self.projector.create_growth_projection(
            graph.total_users() as u64,
            metrics.k_factor,
            days,
            conversion,
            churn.clamp(0.0, 1.0),
        )
    }

    /// Evaluates every configured effect against the current graph.
    pub fn evaluate_effects(&self) -> BTreeMap<&'static str, f64> {
        self.effects
            .evaluate(self.builder.graph(), &self.current_metrics())
    }

    pub fn graph(&self) -> &ReferralGraph {
        self.builder.graph()
    }

    pub fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    /// Mutable access for churn marking and direct referrals between passes.
    pub fn builder_mut(&mut self) -> &mut GraphBuilder {
        &mut self.builder
    }

    pub fn invitations_mut(&mut self) -> &mut InvitationSimulator {
        &mut self.invitations
    }

    pub fn total_invitations_sent(&self) -> usize {
        self.total_invitations_sent
    }

    pub fn effects(&self) -> &EffectSet {
        &self.effects
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::TriggerDecision;
    use viral_env::SystemContext;

    fn seeded_config(acceptance: f64) -> NetworkConfig {
        NetworkConfig::builder()
            .base_acceptance_rate(acceptance)
            .base_referral_probability(1.0)
            .max_referrals_per_user(3)
            .enable_network_effects(false)
            .random_seed(42)
            .build()
            .unwrap()
    }

    fn fixed(count: u32) -> Box<dyn TriggerDetector> {
        Box::new(move |_: &Persona, _: &[ReferralEvent]| TriggerDecision {
            should_refer: true,
            referral_count: count,
            probability: 1.0,
        })
    }

    fn personas(n: usize) -> Vec<Persona> {
        (0..n).map(|i| Persona::new(format!("p{}", i))).collect()
    }

    #[test]
    fn test_no_referrals_without_trigger() {
        let never: Box<dyn TriggerDetector> =
            Box::new(|_: &Persona, _: &[ReferralEvent]| TriggerDecision::decline(0.0));
        let mut sim = ReferralSimulator::with_trigger(seeded_config(0.5), SystemContext::shared(), never);

        let graph = sim.simulate_referrals(&personas(4), &[]);
        assert_eq!(graph.total_users(), 4);
        assert_eq!(graph.organic_users(), 4);
        assert_eq!(graph.total_referrals(), 0);
        assert_eq!(sim.total_invitations_sent(), 0);
    }

    #[test]
    fn test_count_capped_by_config() {
        let mut sim = ReferralSimulator::with_trigger(seeded_config(0.9), SystemContext::shared(), fixed(50));
        let graph = sim.simulate_referrals(&personas(2), &[]);

        assert_eq!(sim.total_invitations_sent(), 6);
        assert!(graph.total_referrals() <= 6);
        assert_eq!(graph.total_users(), 2 + graph.total_referrals());
        assert!(graph.invariant_violations().is_empty());
    }

    #[test]
    fn test_certain_acceptance_grows_graph() {
        let config = NetworkConfig::builder()
            .base_acceptance_rate(1.0)
            .max_referrals_per_user(2)
            .enable_network_effects(false)
            .random_seed(7)
            .build()
            .unwrap();
        let mut sim = ReferralSimulator::with_trigger(config, SystemContext::shared(), fixed(2));
        let graph = sim.simulate_referrals(&personas(3), &[]);

        // Acceptance is clamped to 0.9, so not every invitation converts.
        assert_eq!(sim.total_invitations_sent(), 6);
        assert!(graph.total_referrals() <= 6);
        assert_eq!(graph.referred_users(), graph.total_referrals());
        let metrics = sim.current_metrics();
        approx::assert_relative_eq!(
            metrics.conversion_rate,
            graph.total_referrals() as f64 / 6.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_churned_personas_do_not_refer() {
        let mut sim = ReferralSimulator::with_trigger(seeded_config(0.9), SystemContext::shared(), fixed(3));
        let cohort = personas(1);
        sim.builder_mut().add_personas(&cohort);
        sim.builder_mut().mark_as_churned("p0");

        sim.simulate_referrals(&cohort, &[]);
        assert_eq!(sim.total_invitations_sent(), 0);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let run = || {
            let mut sim = ReferralSimulator::new(seeded_config(0.5), SystemContext::shared());
            let graph = sim.simulate_referrals(&personas(10), &[]);
            let mut edges: Vec<_> = graph
                .edges()
                .iter()
                .map(|e| (e.from.to_string(), e.to.to_string(), e.channel))
                .collect();
            edges.sort();
            (sim.total_invitations_sent(), edges)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_metrics_without_invitation_count() {
        let sim = ReferralSimulator::new(seeded_config(0.5), SystemContext::shared());
        let mut graph = ReferralGraph::empty();
        graph.add_node("a".into(), None, viral_env::Timestamp::EPOCH, Default::default());

        let metrics = sim.calculate_metrics(&graph, None);
        assert_eq!(metrics.total_users, 1);
        assert_eq!(metrics.conversion_rate, 0.0);
        assert_eq!(sim.calculate_viral_coefficient(&graph), 0.0);
    }

    #[test]
    fn test_project_current_growth() {
        let mut sim = ReferralSimulator::with_trigger(seeded_config(0.9), SystemContext::shared(), fixed(3));
        sim.simulate_referrals(&personas(20), &[]);

        let projection = sim.project_current_growth(5).unwrap();
        assert_eq!(projection.starting_users, sim.graph().total_users() as u64);
        assert_eq!(projection.data_points.len(), 5);
        assert!(sim.project_current_growth(0).is_err());

        let effects = sim.evaluate_effects();
        assert!(effects.contains_key("churn_reduction"));
    }
}
