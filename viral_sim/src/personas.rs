//! Synthetic persona cohorts.
//!
//! Profile fields are drawn uniformly from small fixed vocabularies so the
//! harness can exercise trigger boosts and node metadata without a real
//! persona source.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use viral_core::Persona;
use viral_env::{EngineContext, UserId};

/// Random stream reserved for persona generation.
const PERSONA_STREAM: u64 = 0x9e45;

const ARCHETYPES: [&str; 5] = ["pioneer", "pragmatist", "connector", "skeptic", "lurker"];
const EXPERIENCE_LEVELS: [&str; 3] = ["junior", "mid", "senior"];
const COLLABORATION_STYLES: [&str; 3] = ["solo", "pair", "team"];
const TECH_ADOPTION: [&str; 3] = ["early", "mainstream", "late"];
const REFERRAL_TRIGGERS: [&str; 5] = [
    "aha_moment",
    "milestone_reached",
    "team_onboarding",
    "public_launch",
    "peer_request",
];

/// Most triggers a single persona carries.
const MAX_TRIGGERS: usize = 3;

/// Generates personas from a seeded stream.
pub struct CohortGenerator {
    rng: ChaCha8Rng,
    generated: usize,
}

impl CohortGenerator {
    pub fn new(context: &dyn EngineContext) -> Self {
        Self {
            rng: context.derive_rng(PERSONA_STREAM),
            generated: 0,
        }
    }

    /// Generates `count` fresh personas with ids `persona_<n>`.
    pub fn cohort(&mut self, count: usize) -> Vec<Persona> {
        (0..count)
            .map(|_| {
                let id = UserId::new(format!("persona_{}", self.generated));
                self.generated += 1;
                self.profile(id)
            })
            .collect()
    }

    /// Gives an existing user (e.g. one who just accepted an invitation) a profile.
    pub fn profile(&mut self, id: UserId) -> Persona {
        let trigger_count = self.rng.gen_range(0..=MAX_TRIGGERS);
        let triggers: Vec<&str> = REFERRAL_TRIGGERS
            .choose_multiple(&mut self.rng, trigger_count)
            .copied()
            .collect();

        let mut persona = Persona::new(id)
            .with_archetype(pick(&mut self.rng, &ARCHETYPES))
            .with_triggers(triggers);
        persona.experience_level = pick(&mut self.rng, &EXPERIENCE_LEVELS).to_string();
        persona.collaboration_style = pick(&mut self.rng, &COLLABORATION_STYLES).to_string();
        persona.tech_adoption = pick(&mut self.rng, &TECH_ADOPTION).to_string();
        persona
    }

    /// Number of personas generated by [`cohort`](Self::cohort) so far.
    pub fn generated(&self) -> usize {
        self.generated
    }
}

fn pick<'a, R: Rng>(rng: &mut R, options: &[&'a str]) -> &'a str {
    options[rng.gen_range(0..options.len())]
}
