//! The sample scenarios under `scenarios/` load, run and satisfy their own assertions.

use std::path::{Path, PathBuf};

use cwnd_lab_simulator::{Outcome, scenario_runner};

fn scenario_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../scenarios")
        .join(name)
}

#[test]
fn sample_scenarios_pass_their_assertions() {
    let expected = [
        ("classic_exercise.toml", Outcome::Completed),
        ("steady_rcvwnd.toml", Outcome::Completed),
        ("long_outage_timeout.toml", Outcome::TimedOut),
        ("half_ssthresh.toml", Outcome::Completed),
    ];
    for (name, outcome) in expected {
        let report = scenario_runner::run_scenario(&scenario_path(name))
            .unwrap_or_else(|e| panic!("{name}: {e:#}"));
        assert_eq!(report.outcome, outcome, "{name}");
    }
}

#[test]
fn missing_scenario_file_is_an_error() {
    let err = scenario_runner::run_scenario(&scenario_path("does_not_exist.toml")).unwrap_err();
    assert!(format!("{err:#}").contains("does_not_exist.toml"));
}
