//! Viral Core - Referral Graph and Growth Simulation Engine
//!
//! Models how a population of synthetic users spreads a product through
//! referrals and measures that spread:
//! 1. **Referral graph**: users, accepted referrals and their derived counters
//! 2. **Invitation model**: probabilistic acceptance with social proof
//! 3. **Growth metrics**: k-factor, cycle time, chain depth, network value
//! 4. **Projection**: discrete day-by-day extrapolation with curve classification
//!
//! The engine is synchronous and in-memory. Time and randomness come from a
//! [`viral_env::EngineContext`], so seeded runs are reproducible.

pub mod builder;
pub mod config;
pub mod effects;
pub mod error;
pub mod event;
pub mod graph;
pub mod growth;
pub mod invitation;
pub mod metrics;
pub mod persona;
pub mod simulator;
pub mod trigger;

// Re-export key types for convenience
pub use builder::{GraphBuilder, GraphStatistics};
pub use config::{ChannelWeights, NetworkConfig, NetworkConfigBuilder};
pub use effects::{ChurnReductionEffect, EffectSet, GrowthEffect, NetworkValueEffect, SocialProofEffect};
pub use error::{GrowthError, GrowthResult};
pub use event::ReferralEvent;
pub use graph::{Channel, Metadata, ReferralEdge, ReferralGraph, ReferralNode};
pub use growth::{GrowthDataPoint, GrowthProjection, GrowthProjector, GrowthType};
pub use invitation::{acceptance_probability, InvitationOutcome, InvitationSimulator};
pub use metrics::{NetworkMetrics, ViralCoefficientCalculator};
pub use persona::Persona;
pub use simulator::ReferralSimulator;
pub use trigger::{BaselineTriggerDetector, TriggerDecision, TriggerDetector};
