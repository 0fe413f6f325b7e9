//! Viral Growth Deterministic Simulation Harness
//!
//! Runs the growth engine over synthetic persona cohorts under a virtual
//! clock, checking the engine's invariants after every round.
//!
//! # Core Principle
//!
//! All sources of non-determinism are controlled:
//! - **Time**: a virtual clock advanced by sampled inter-round gaps
//! - **Randomness**: every stream derived from a single 64-bit seed
//!
//! # Usage
//!
//! ```ignore
//! use viral_sim::{ScenarioId, ScenarioRunner};
//!
//! let result = ScenarioRunner::new(42, 50)
//!     .with_rounds(5)
//!     .run(ScenarioId::ViralLoop);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod personas;
pub mod exporter;
pub mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use error::{SimError, SimResult};
pub use exporter::{SimEvent, SimExport, SimFrame};
pub use personas::CohortGenerator;
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
