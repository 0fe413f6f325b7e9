//! JSON exporter for simulation runs.
//!
//! Exports per-round metric frames plus the final projection so runs can be
//! plotted or diffed outside the harness.

use crate::runner::ScenarioResult;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use viral_core::{Channel, GrowthProjection, NetworkMetrics};

/// A single round of simulation data.
#[derive(Debug, Clone, Serialize)]
pub struct SimFrame {
    pub round: usize,

    /// Virtual days since the start of the run
    pub elapsed_days: f64,

    pub metrics: NetworkMetrics,

    /// Effect multipliers evaluated after the round
    pub effects: BTreeMap<&'static str, f64>,

    /// Notable happenings (churn waves, violations, etc.)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,
}

/// Simulation event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl SimEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: None,
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: Some("warn".to_string()),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Virtual duration in days
    pub duration_days: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<GrowthProjection>,

    pub channel_breakdown: BTreeMap<Channel, usize>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_days: 0.0,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
            projection: None,
            channel_breakdown: BTreeMap::new(),
        }
    }

    /// Builds an export from a finished run.
    pub fn from_result(result: &ScenarioResult) -> Self {
        let mut export = Self::new(result.scenario.name(), result.seed);
        for frame in &result.frames {
            export.add_frame(frame.clone());
        }
        export.channel_breakdown = result.channel_breakdown.clone();
        export.finalize(result.passed, result.failure_reason.clone(), result.projection.clone());
        export
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_days = frame.elapsed_days;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(
        &mut self,
        passed: bool,
        failure_reason: Option<String>,
        projection: Option<GrowthProjection>,
    ) {
        self.passed = passed;
        self.failure_reason = failure_reason;
        self.projection = projection;
    }

    /// Renders the export as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
