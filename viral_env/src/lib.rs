//! Viral Growth Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the growth engine
//! to run in both **Production** (wall clock, OS entropy) and **Simulation**
//! (virtual clock, seeded streams) environments.
//!
//! # Core Concept
//!
//! The engine never reads the clock or a global RNG directly. Everything that
//! would introduce non-determinism goes through an [`EngineContext`]:
//! - Time (`now()`)
//! - Randomness (`derive_rng()`)
//!
//! By deriving all entropy from a single 64-bit seed, any simulated growth
//! curve becomes reproducible via its seed number.
//!
//! # Example
//!
//! ```ignore
//! use viral_env::{EngineContext, SystemContext};
//!
//! let ctx = SystemContext::seeded(42);
//! let mut rng = ctx.derive_rng(1);
//! let joined_at = ctx.now();
//! ```

mod context;
mod error;
mod system_impl;
mod types;

pub use context::{mix_seed, EngineContext};
pub use error::EnvError;
pub use system_impl::SystemContext;
pub use types::{Timestamp, UserId, MILLIS_PER_DAY};
