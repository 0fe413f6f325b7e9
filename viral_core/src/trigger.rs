//! Referral trigger decisions.
//!
//! The engine asks a [`TriggerDetector`] once per persona per simulation pass
//! whether that persona refers anyone and how many invitations to send. Hosts
//! supply their own detector; [`BaselineTriggerDetector`] is a simple
//! probability-driven default. Closures with the right signature also work.

use crate::config::NetworkConfig;
use crate::event::ReferralEvent;
use crate::persona::Persona;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use viral_env::{mix_seed, EngineContext};

/// Random stream reserved for trigger draws.
const TRIGGER_STREAM: u64 = 0x7219;

/// Probability boost per declared referral trigger.
const TRIGGER_BOOST: f64 = 0.1;

/// Whether and how much a persona refers this pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TriggerDecision {
    pub should_refer: bool,
    pub referral_count: u32,
    pub probability: f64,
}

impl TriggerDecision {
    /// A decision not to refer.
    pub fn decline(probability: f64) -> Self {
        Self {
            should_refer: false,
            referral_count: 0,
            probability,
        }
    }
}

/// Decides whether a persona refers during a pass.
pub trait TriggerDetector: Send {
    fn evaluate(&mut self, persona: &Persona, recent_events: &[ReferralEvent]) -> TriggerDecision;
}

impl<F> TriggerDetector for F
where
    F: FnMut(&Persona, &[ReferralEvent]) -> TriggerDecision + Send,
{
    fn evaluate(&mut self, persona: &Persona, recent_events: &[ReferralEvent]) -> TriggerDecision {
        self(persona, recent_events)
    }
}

/// Refers with `base_referral_probability * (1 + 0.1 * triggers)`.
///
/// Invitation counts are drawn uniformly from what is left of the persona's
/// `max_referrals_per_user` allowance after the invitations in `recent_events`.
pub struct BaselineTriggerDetector {
    base_probability: f64,
    max_referrals: u32,
    rng: ChaCha8Rng,
}

impl BaselineTriggerDetector {
    pub fn new(config: &NetworkConfig, context: &dyn EngineContext) -> Self {
        let rng = match config.random_seed() {
            Some(seed) => ChaCha8Rng::seed_from_u64(mix_seed(seed, TRIGGER_STREAM)),
            None => context.derive_rng(TRIGGER_STREAM),
        };
        Self {
            base_probability: config.base_referral_probability(),
            max_referrals: config.max_referrals_per_user(),
            rng,
        }
    }

    /// Referral probability for a persona before any draw.
    pub fn probability_for(&self, persona: &Persona) -> f64 {
        let boost = 1.0 + TRIGGER_BOOST * persona.referral_triggers.len() as f64;
        (self.base_probability * boost).clamp(0.0, 1.0)
    }
}

impl TriggerDetector for BaselineTriggerDetector {
    fn evaluate(&mut self, persona: &Persona, recent_events: &[ReferralEvent]) -> TriggerDecision {
        let probability = self.probability_for(persona);

        let already_sent = recent_events
            .iter()
            .filter(|e| e.referrer_id == persona.id)
            .count();
        let remaining = self
            .max_referrals
            .saturating_sub(u32::try_from(already_sent).unwrap_or(u32::MAX));

        if remaining == 0 || !self.rng.gen_bool(probability) {
            return TriggerDecision::decline(probability);
        }

        TriggerDecision {
            should_refer: true,
            referral_count: self.rng.gen_range(1..=remaining),
            probability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Channel;
    use uuid::Uuid;
    use viral_env::{SystemContext, Timestamp, UserId};

    fn detector(probability: f64, max: u32) -> BaselineTriggerDetector {
        let config = NetworkConfig::builder()
            .base_referral_probability(probability)
            .max_referrals_per_user(max)
            .random_seed(11)
            .build()
            .unwrap();
        BaselineTriggerDetector::new(&config, &SystemContext::new())
    }

    #[test]
    fn test_triggers_raise_probability() {
        let d = detector(0.5, 5);
        let plain = Persona::new("p");
        let eager = Persona::new("p").with_triggers(["launch", "milestone"]);

        assert_eq!(d.probability_for(&plain), 0.5);
        approx::assert_relative_eq!(d.probability_for(&eager), 0.6, epsilon = 1e-12);

        let capped = detector(0.95, 5);
        assert_eq!(capped.probability_for(&eager), 1.0);
    }

    #[test]
    fn test_certain_referral_within_allowance() {
        let mut d = detector(1.0, 3);
        let persona = Persona::new("p");

        for _ in 0..50 {
            let decision = d.evaluate(&persona, &[]);
            assert!(decision.should_refer);
            assert!((1..=3).contains(&decision.referral_count));
        }
    }

    #[test]
    fn test_exhausted_allowance_declines() {
        let mut d = detector(1.0, 1);
        let persona = Persona::new("p");
        let sent = ReferralEvent::sent(Uuid::nil(), UserId::from("p"), Timestamp::EPOCH, Channel::Email);

        let decision = d.evaluate(&persona, &[sent]);
        assert!(!decision.should_refer);
        assert_eq!(decision.referral_count, 0);
    }

    #[test]
    fn test_zero_probability_never_refers() {
        let mut d = detector(0.0, 10);
        let persona = Persona::new("p");
        assert!((0..50).all(|_| !d.evaluate(&persona, &[]).should_refer));
    }

    #[test]
    fn test_closure_detector() {
        let mut always_two = |_: &Persona, _: &[ReferralEvent]| TriggerDecision {
            should_refer: true,
            referral_count: 2,
            probability: 1.0,
        };
        let decision = always_two.evaluate(&Persona::new("p"), &[]);
        assert_eq!(decision.referral_count, 2);
    }
}
