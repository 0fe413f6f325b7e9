//! Scenario runner - drives multi-round growth simulations and checks the
//! engine's invariants after every round.

use crate::context::SimContext;
use crate::error::{SimError, SimResult};
use crate::exporter::{SimEvent, SimFrame};
use crate::personas::CohortGenerator;
use crate::scenarios::ScenarioId;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use viral_core::invitation::MAX_ACCEPTANCE_PROBABILITY;
use viral_core::{
    acceptance_probability, Channel, GrowthProjection, NetworkConfig, NetworkMetrics,
    ReferralSimulator,
};
use viral_env::{EngineContext, UserId};

/// Random stream for inter-round elapsed time.
const TIMING_STREAM: u64 = 0x71e;

/// Random stream for churn draws.
const CHURN_STREAM: u64 = 0xc4a2;

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Rounds executed
    pub rounds: usize,

    /// Virtual days elapsed
    pub final_time_days: f64,

    /// Users in the graph at the end
    pub final_user_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Counters collected during the run
    pub metrics: ScenarioMetrics,

    /// Projection from the final graph
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<GrowthProjection>,

    #[serde(skip)]
    pub frames: Vec<SimFrame>,

    #[serde(skip)]
    pub channel_breakdown: BTreeMap<Channel, usize>,
}

/// Counters collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Invitations sent across all rounds
    pub invitations_sent: usize,

    /// Accepted referrals in the final graph
    pub referrals_accepted: usize,

    /// Users churned by the harness
    pub churned_users: usize,

    /// Invariant checks performed
    pub invariant_checks: usize,

    /// Highest acceptance probability observed
    pub max_acceptance_probability: f64,

    pub final_k_factor: f64,
}

/// Runs growth scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Size of the initial persona cohort
    num_personas: usize,

    /// Simulation passes per run
    rounds: usize,

    /// Days projected after the last round
    projection_days: u32,

    /// Configuration the scenario overrides are applied to
    base_config: NetworkConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_personas: usize) -> Self {
        Self {
            seed,
            num_personas,
            rounds: 5,
            projection_days: 30,
            base_config: NetworkConfig::default(),
        }
    }

    /// Sets the number of rounds.
    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Sets the projection horizon.
    pub fn with_projection_days(mut self, days: u32) -> Self {
        self.projection_days = days;
        self
    }

    /// Sets the configuration scenarios start from.
    pub fn with_base_config(mut self, config: NetworkConfig) -> Self {
        self.base_config = config;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        if scenario.is_adverse() {
            warn!("Adverse scenario: the network is expected to shrink");
        }

        match self.execute(scenario) {
            Ok(result) => result,
            Err(e) => self.aborted(scenario, e),
        }
    }

    fn execute(&self, scenario: ScenarioId) -> SimResult<ScenarioResult> {
        let config = scenario
            .configure(self.base_config.to_builder().random_seed(self.seed))
            .build()?;

        let context = SimContext::shared(self.seed);
        let engine_context: Arc<dyn EngineContext> = context.clone();

        let mut cohorts = CohortGenerator::new(context.as_ref());
        let mut personas = cohorts.cohort(self.num_personas);
        let mut known: HashSet<UserId> = personas.iter().map(|p| p.id.clone()).collect();

        let mut sim = ReferralSimulator::new(config.clone(), engine_context);
        let mut timing = context.derive_rng(TIMING_STREAM);
        let mut churn_rng = context.derive_rng(CHURN_STREAM);
        let elapsed = Normal::new(
            config.avg_time_to_first_referral_days(),
            config.time_to_first_referral_stddev_days(),
        )
        .map_err(|e| SimError::Timing(e.to_string()))?;

        let mut metrics = ScenarioMetrics::default();
        let mut frames = Vec::with_capacity(self.rounds);
        let mut failure: Option<String> = None;

        for round in 0..self.rounds {
            let graph = sim.simulate_referrals(&personas, &[]);
            let mut events = Vec::new();

            // Newly joined users refer from the next round on
            let mut joined: Vec<UserId> = graph
                .nodes()
                .map(|n| n.user_id.clone())
                .filter(|id| !known.contains(id))
                .collect();
            joined.sort();
            for id in joined {
                known.insert(id.clone());
                personas.push(cohorts.profile(id));
            }

            let days = elapsed.sample(&mut timing).max(0.0);
            context.advance_days(days);

            let churned = apply_churn(&mut sim, &config, days, &mut churn_rng);
            metrics.churned_users += churned;
            if churned > 0 {
                events.push(SimEvent::info(format!("{} users churned", churned)));
            }

            metrics.invariant_checks += 1;
            let violations = sim.graph().invariant_violations();
            if !violations.is_empty() {
                let reason = format!("round {}: {}", round, violations.join("; "));
                events.push(SimEvent::warn(reason.clone()));
                failure.get_or_insert(reason);
            }

            let probability = acceptance_probability(&config, sim.graph().total_users());
            metrics.max_acceptance_probability = metrics.max_acceptance_probability.max(probability);
            if probability > MAX_ACCEPTANCE_PROBABILITY {
                failure.get_or_insert(format!(
                    "round {}: acceptance probability {:.3} above cap",
                    round, probability
                ));
            }

            let round_metrics = sim.current_metrics();
            debug!(
                "  round={} | t={:.1}d | users={} | referrals={} | k={:.3}",
                round,
                context.elapsed_days(),
                round_metrics.total_users,
                round_metrics.total_referrals,
                round_metrics.k_factor
            );
            frames.push(SimFrame {
                round,
                elapsed_days: context.elapsed_days(),
                metrics: round_metrics,
                effects: sim.evaluate_effects(),
                events,
            });
        }

        let final_metrics = sim.current_metrics();
        metrics.invitations_sent = sim.total_invitations_sent();
        metrics.referrals_accepted = final_metrics.total_referrals;
        metrics.final_k_factor = final_metrics.k_factor;

        let projection = match sim.project_current_growth(self.projection_days) {
            Ok(projection) => Some(projection),
            Err(e) => {
                failure.get_or_insert(format!("projection failed: {}", e));
                None
            }
        };

        if failure.is_none() {
            failure = check_expectations(scenario, &config, &final_metrics, &metrics);
        }
        let passed = failure.is_none();

        info!(
            "{} {} complete: {} users, {} referrals, k={:.3}",
            if passed { "✓" } else { "✗" },
            scenario.name(),
            final_metrics.total_users,
            final_metrics.total_referrals,
            final_metrics.k_factor
        );

        Ok(ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            rounds: self.rounds,
            final_time_days: context.elapsed_days(),
            final_user_count: sim.graph().total_users(),
            failure_reason: failure,
            metrics,
            projection,
            frames,
            channel_breakdown: sim.graph().channel_breakdown(),
        })
    }

    fn aborted(&self, scenario: ScenarioId, error: SimError) -> ScenarioResult {
        warn!("Scenario {} aborted: {}", scenario.name(), error);
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: false,
            rounds: 0,
            final_time_days: 0.0,
            final_user_count: 0,
            failure_reason: Some(error.to_string()),
            metrics: ScenarioMetrics::default(),
            projection: None,
            frames: Vec::new(),
            channel_breakdown: BTreeMap::new(),
        }
    }
}

/// Churns active users with probability `daily_churn * days`, scaled by the
/// churn-reduction effect. Returns how many were churned.
fn apply_churn(
    sim: &mut ReferralSimulator,
    config: &NetworkConfig,
    days: f64,
    rng: &mut ChaCha8Rng,
) -> usize {
    let reduction = sim
        .evaluate_effects()
        .get("churn_reduction")
        .copied()
        .unwrap_or(1.0);
    let probability = (config.daily_churn_rate() * days * reduction).clamp(0.0, 1.0);

    let mut active: Vec<UserId> = sim
        .graph()
        .nodes()
        .filter(|n| !n.churned)
        .map(|n| n.user_id.clone())
        .collect();
    active.sort();

    let mut churned = 0;
    for user in active {
        if rng.gen_bool(probability) {
            sim.builder_mut().mark_as_churned(user.as_str());
            churned += 1;
        }
    }
    churned
}

fn check_expectations(
    scenario: ScenarioId,
    config: &NetworkConfig,
    final_metrics: &NetworkMetrics,
    metrics: &ScenarioMetrics,
) -> Option<String> {
    for (name, rate) in [
        ("active_referrer_rate", final_metrics.active_referrer_rate),
        ("churn_rate", final_metrics.churn_rate),
        ("conversion_rate", final_metrics.conversion_rate),
    ] {
        if !(0.0..=1.0).contains(&rate) {
            return Some(format!("{} {:.3} outside [0, 1]", name, rate));
        }
    }

    match scenario {
        ScenarioId::ViralLoop if final_metrics.total_referrals == 0 => {
            Some("no referral was accepted".to_string())
        }
        ScenarioId::ChurnStorm if final_metrics.churn_rate == 0.0 => {
            Some("no user churned".to_string())
        }
        ScenarioId::NoNetworkEffects
            if metrics.max_acceptance_probability > config.base_acceptance_rate() =>
        {
            Some(format!(
                "acceptance {:.3} exceeded base rate {:.3}",
                metrics.max_acceptance_probability,
                config.base_acceptance_rate()
            ))
        }
        _ => None,
    }
}
