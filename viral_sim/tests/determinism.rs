use proptest::prelude::*;
use viral_sim::{ScenarioId, ScenarioRunner, SimExport};

fn fingerprint(seed: u64, scenario: ScenarioId) -> (bool, usize, usize, usize, String) {
    let result = ScenarioRunner::new(seed, 25).with_rounds(3).run(scenario);
    let export = SimExport::from_result(&result);
    (
        result.passed,
        result.final_user_count,
        result.metrics.invitations_sent,
        result.metrics.churned_users,
        serde_json::to_string(&export.channel_breakdown).unwrap(),
    )
}

#[test]
fn test_every_scenario_is_deterministic() {
    for scenario in ScenarioId::all() {
        assert_eq!(fingerprint(42, scenario), fingerprint(42, scenario), "{}", scenario);
    }
}

#[test]
fn test_every_scenario_passes_default_seed() {
    for scenario in ScenarioId::all() {
        let result = ScenarioRunner::new(42, 40).with_rounds(4).run(scenario);
        assert!(result.passed, "{}: {:?}", scenario, result.failure_reason);
    }
}

#[test]
fn test_export_matches_run() {
    let result = ScenarioRunner::new(3, 20).with_rounds(2).run(ScenarioId::ViralLoop);
    let export = SimExport::from_result(&result);

    assert_eq!(export.frames.len(), 2);
    assert_eq!(export.passed, result.passed);
    approx::assert_relative_eq!(export.duration_days, result.final_time_days);

    let value: serde_json::Value = serde_json::from_str(&export.to_json().unwrap()).unwrap();
    assert_eq!(value["scenario"], "viral_loop");
    assert!(value["projection"]["data_points"].is_array());
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 16, .. ProptestConfig::default() })]

    #[test]
    fn prop_invariants_hold_for_any_seed(seed in any::<u64>()) {
        let result = ScenarioRunner::new(seed, 15).with_rounds(2).run(ScenarioId::ViralLoop);
        // Invariant or clamp breaks are reported as round failures
        let reason = result.failure_reason.unwrap_or_default();
        prop_assert!(!reason.starts_with("round"), "{}", reason);
    }
}
