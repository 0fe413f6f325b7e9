//! Probabilistic invitation simulation.
//!
//! For each requested invitation the simulator picks a delivery channel,
//! computes the acceptance probability (optionally boosted by social proof
//! from the current network size), and draws acceptance. Accepted
//! invitations mint a fresh user id from a counter owned by the simulator
//! instance, so two simulators never share ids and tests can reset them.

use crate::config::NetworkConfig;
use crate::error::{GrowthError, GrowthResult};
use crate::event::ReferralEvent;
use crate::graph::Channel;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use viral_env::{mix_seed, EngineContext, UserId};

/// First value of the generated-user counter.
pub const FIRST_GENERATED_USER_ID: u64 = 1000;

/// Upper bound on the effective acceptance probability.
pub const MAX_ACCEPTANCE_PROBABILITY: f64 = 0.9;

/// Random stream reserved for invitation draws.
const INVITATION_STREAM: u64 = 0x1a7;

/// Result of simulating one or more referrers' invitations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InvitationOutcome {
    pub events: Vec<ReferralEvent>,
    pub invitations_sent: usize,
    pub invitations_accepted: usize,
    /// accepted / sent, or 0 when nothing was sent
    pub acceptance_rate: f64,
}

impl InvitationOutcome {
    fn from_events(events: Vec<ReferralEvent>) -> Self {
        let invitations_sent = events.len();
        let invitations_accepted = events.iter().filter(|e| e.is_accepted()).count();
        let acceptance_rate = if invitations_sent > 0 {
            invitations_accepted as f64 / invitations_sent as f64
        } else {
            0.0
        };
        Self {
            events,
            invitations_sent,
            invitations_accepted,
            acceptance_rate,
        }
    }
}

/// Effective acceptance probability for a network of `network_size` users.
///
/// ```text
/// p = base * (1 + f * (m - 1)),  f = log10(max(1, n)) / 5
/// ```
///
/// The social-proof term only applies when network effects are enabled.
/// The result is clamped to `[0, MAX_ACCEPTANCE_PROBABILITY]`.
pub fn acceptance_probability(config: &NetworkConfig, network_size: usize) -> f64 {
    let mut probability = config.base_acceptance_rate();

    if config.enable_network_effects() {
        let social_proof_factor = (network_size.max(1) as f64).log10() / 5.0;
        probability *= 1.0 + social_proof_factor * (config.social_proof_multiplier() - 1.0);
    }

    probability.clamp(0.0, MAX_ACCEPTANCE_PROBABILITY)
}

/// Generates referral events for referrers.
pub struct InvitationSimulator {
    config: NetworkConfig,
    context: Arc<dyn EngineContext>,
    rng: ChaCha8Rng,
    next_user_id: u64,
}

impl InvitationSimulator {
    /// Creates a simulator.
    ///
    /// Draws come from `config.random_seed()` when set, otherwise from a
    /// stream derived from `context`.
    pub fn new(config: NetworkConfig, context: Arc<dyn EngineContext>) -> Self {
        let rng = match config.random_seed() {
            Some(seed) => ChaCha8Rng::seed_from_u64(mix_seed(seed, INVITATION_STREAM)),
            None => context.derive_rng(INVITATION_STREAM),
        };
        Self::with_rng(config, context, rng)
    }

    /// Creates a simulator drawing from a caller-supplied generator.
    pub fn with_rng(config: NetworkConfig, context: Arc<dyn EngineContext>, rng: ChaCha8Rng) -> Self {
        Self {
            config,
            context,
            rng,
            next_user_id: FIRST_GENERATED_USER_ID,
        }
    }

    /// Acceptance probability under this simulator's config.
    pub fn acceptance_probability(&self, network_size: usize) -> f64 {
        acceptance_probability(&self.config, network_size)
    }

    /// Picks a channel by a cumulative scan over the configured weights.
    pub fn select_channel(&mut self) -> Channel {
        let draw: f64 = self.rng.gen();
        let mut cumulative = 0.0;
        for (channel, weight) in self.config.channel_weights().entries() {
            cumulative += weight;
            if draw < cumulative {
                return channel;
            }
        }
        // Rounding can leave the cumulative sum just under the draw
        Channel::Email
    }

    /// Simulates `invitation_count` invitations from `referrer_id`.
    pub fn simulate_invitations(
        &mut self,
        referrer_id: &UserId,
        invitation_count: usize,
        network_size: usize,
    ) -> InvitationOutcome {
        let probability = self.acceptance_probability(network_size);
        let mut events = Vec::with_capacity(invitation_count);

        for _ in 0..invitation_count {
            let id = uuid::Builder::from_random_bytes(self.rng.gen()).into_uuid();
            let channel = self.select_channel();
            let mut event = ReferralEvent::sent(id, referrer_id.clone(), self.context.now(), channel);

            if self.rng.gen::<f64>() < probability {
                let user = self.mint_user_id();
                event.accept(user, self.context.now());
            }
            events.push(event);
        }

        let outcome = InvitationOutcome::from_events(events);
        debug!(
            referrer = %referrer_id,
            sent = outcome.invitations_sent,
            accepted = outcome.invitations_accepted,
            probability,
            "invitations simulated"
        );
        outcome
    }

    /// Simulates invitations for parallel arrays of referrers and counts.
    ///
    /// Fails before any draw if the arrays differ in length.
    pub fn simulate_batch(
        &mut self,
        referrer_ids: &[UserId],
        invitation_counts: &[usize],
        network_size: usize,
    ) -> GrowthResult<InvitationOutcome> {
        if referrer_ids.len() != invitation_counts.len() {
            return Err(GrowthError::LengthMismatch {
                referrers: referrer_ids.len(),
                counts: invitation_counts.len(),
            });
        }

        let mut events = Vec::with_capacity(invitation_counts.iter().sum());
        for (referrer, &count) in referrer_ids.iter().zip(invitation_counts) {
            events.extend(self.simulate_invitations(referrer, count, network_size).events);
        }
        Ok(InvitationOutcome::from_events(events))
    }

    /// Restores the generated-user counter to its starting value.
    pub fn reset_user_counter(&mut self) {
        self.next_user_id = FIRST_GENERATED_USER_ID;
    }

    /// The number the next generated user id will carry.
    pub fn next_user_id(&self) -> u64 {
        self.next_user_id
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    fn mint_user_id(&mut self) -> UserId {
        let id = UserId::new(format!("user_{}", self.next_user_id));
        self.next_user_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use viral_env::SystemContext;

    fn simulator(config: NetworkConfig) -> InvitationSimulator {
        InvitationSimulator::new(config, Arc::new(SystemContext::seeded(3)))
    }

    fn seeded(rate: f64) -> NetworkConfig {
        NetworkConfig::builder()
            .base_acceptance_rate(rate)
            .random_seed(42)
            .build()
            .unwrap()
    }

    #[test]
    fn test_acceptance_probability_without_network_effects() {
        let config = NetworkConfig::builder()
            .base_acceptance_rate(0.3)
            .enable_network_effects(false)
            .build()
            .unwrap();

        assert_eq!(acceptance_probability(&config, 1_000_000), 0.3);
    }

    #[test]
    fn test_social_proof_boost() {
        let config = NetworkConfig::builder()
            .base_acceptance_rate(0.2)
            .social_proof_multiplier(2.0)
            .build()
            .unwrap();

        // n = 100 -> f = 0.4 -> 0.2 * 1.4
        approx::assert_relative_eq!(acceptance_probability(&config, 100), 0.28, epsilon = 1e-12);
        // n = 0 behaves like n = 1: no boost
        approx::assert_relative_eq!(acceptance_probability(&config, 0), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_acceptance_probability_clamped() {
        let config = NetworkConfig::builder()
            .base_acceptance_rate(1.0)
            .social_proof_multiplier(50.0)
            .build()
            .unwrap();
        assert_eq!(acceptance_probability(&config, 10_000), MAX_ACCEPTANCE_PROBABILITY);

        let shrinking = NetworkConfig::builder()
            .base_acceptance_rate(0.5)
            .social_proof_multiplier(0.0)
            .build()
            .unwrap();
        assert_eq!(acceptance_probability(&shrinking, usize::MAX), 0.0);
    }

    #[test]
    fn test_zero_rate_accepts_nothing() {
        let mut sim = simulator(seeded(0.0));
        let outcome = sim.simulate_invitations(&UserId::from("r"), 20, 10);

        assert_eq!(outcome.invitations_sent, 20);
        assert_eq!(outcome.invitations_accepted, 0);
        assert_eq!(outcome.acceptance_rate, 0.0);
        assert!(outcome.events.iter().all(|e| e.referred_user_id().is_none()));
        assert_eq!(sim.next_user_id(), FIRST_GENERATED_USER_ID);
    }

    #[test]
    fn test_accepted_events_get_sequential_ids() {
        let config = NetworkConfig::builder()
            .base_acceptance_rate(1.0)
            .enable_network_effects(false)
            .random_seed(1)
            .build()
            .unwrap();
        let mut sim = simulator(config);

        // Clamped to 0.9, so count what was actually accepted
        let outcome = sim.simulate_invitations(&UserId::from("r"), 50, 1);
        let ids: Vec<&str> = outcome
            .events
            .iter()
            .filter_map(|e| e.referred_user_id().map(UserId::as_str))
            .collect();

        assert_eq!(ids.len(), outcome.invitations_accepted);
        assert_eq!(ids.first().copied(), Some("user_1000"));
        assert_eq!(sim.next_user_id(), FIRST_GENERATED_USER_ID + ids.len() as u64);
        for event in outcome.events.iter().filter(|e| e.is_accepted()) {
            assert_eq!(event.referrer_id.as_str(), "r");
            assert!(event.accepted_at().is_some());
        }

        sim.reset_user_counter();
        assert_eq!(sim.next_user_id(), FIRST_GENERATED_USER_ID);
    }

    #[test]
    fn test_same_seed_same_outcome() {
        let mut a = simulator(seeded(0.5));
        let mut b = simulator(seeded(0.5));
        let r = UserId::from("r");

        let oa = a.simulate_invitations(&r, 30, 100);
        let ob = b.simulate_invitations(&r, 30, 100);

        assert_eq!(oa.invitations_accepted, ob.invitations_accepted);
        let ids_a: Vec<_> = oa.events.iter().map(|e| (e.id, e.channel)).collect();
        let ids_b: Vec<_> = ob.events.iter().map(|e| (e.id, e.channel)).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_channel_selection_respects_weights() {
        use crate::config::ChannelWeights;

        let config = NetworkConfig::builder()
            .channel_weights(ChannelWeights {
                email: 0.0,
                social: 0.0,
                link: 1.0,
                in_app: 0.0,
            })
            .random_seed(5)
            .build()
            .unwrap();
        let mut sim = simulator(config);

        for _ in 0..100 {
            assert_eq!(sim.select_channel(), Channel::Link);
        }
    }

    #[test]
    fn test_channel_distribution_roughly_matches_defaults() {
        let mut sim = simulator(seeded(0.25));
        let mut email = 0;
        let draws = 10_000;
        for _ in 0..draws {
            if sim.select_channel() == Channel::Email {
                email += 1;
            }
        }
        let share = email as f64 / draws as f64;
        assert!((share - 0.4).abs() < 0.03, "email share {}", share);
    }

    #[test]
    fn test_batch_rejects_length_mismatch() {
        let mut sim = simulator(seeded(0.5));
        let before = sim.next_user_id();

        let err = sim
            .simulate_batch(&[UserId::from("a"), UserId::from("b")], &[1], 10)
            .unwrap_err();
        assert_eq!(err, GrowthError::LengthMismatch { referrers: 2, counts: 1 });
        assert_eq!(sim.next_user_id(), before);
    }

    #[test]
    fn test_batch_aggregates_totals() {
        let mut sim = simulator(seeded(0.5));
        let outcome = sim
            .simulate_batch(&[UserId::from("a"), UserId::from("b")], &[3, 4], 10)
            .unwrap();

        assert_eq!(outcome.invitations_sent, 7);
        assert_eq!(outcome.events.iter().filter(|e| e.referrer_id.as_str() == "a").count(), 3);
        let expected = outcome.invitations_accepted as f64 / 7.0;
        assert_eq!(outcome.acceptance_rate, expected);
    }
}
