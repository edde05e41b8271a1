use anyhow::{Context, anyhow};
use cwnd_lab_abstract::{ExpectedOutcome, TestAssertion, TestScenario};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::engine::Engine;
use crate::trace::{Outcome, SimulationReport};

pub fn load_scenario(path: &Path) -> anyhow::Result<TestScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    parse_scenario(&content)
}

pub fn parse_scenario(content: &str) -> anyhow::Result<TestScenario> {
    toml::from_str(content).context("Failed to parse scenario")
}

/// Run a scenario file to completion and check its assertions.
pub fn run_scenario(path: &Path) -> anyhow::Result<SimulationReport> {
    let scenario = load_scenario(path)?;
    run_loaded_scenario(&scenario)
}

pub fn run_loaded_scenario(scenario: &TestScenario) -> anyhow::Result<SimulationReport> {
    info!("Running Scenario: {}", scenario.name);
    if !scenario.description.is_empty() {
        info!("Description: {}", scenario.description);
    }

    let mut engine = Engine::new(scenario.simulation_config())
        .with_context(|| format!("Invalid configuration in scenario '{}'", scenario.name))?;
    engine.run_until_complete();
    let report = engine.into_report();

    check_assertions(scenario, &report)?;
    info!("Test Scenario Passed!");
    Ok(report)
}

pub fn check_assertions(scenario: &TestScenario, report: &SimulationReport) -> anyhow::Result<()> {
    for assertion in &scenario.assertions {
        match assertion {
            TestAssertion::Outcome { expected } => {
                let wanted = match expected {
                    ExpectedOutcome::Completed => Outcome::Completed,
                    ExpectedOutcome::TimedOut => Outcome::TimedOut,
                };
                if report.outcome != wanted {
                    return Err(anyhow!(
                        "Assertion Failed: run ended {:?}, expected {:?}",
                        report.outcome,
                        wanted
                    ));
                }
            }
            TestAssertion::LossCount { min, max } => {
                let losses = report.loss_count() as u32;
                if losses < *min {
                    return Err(anyhow!(
                        "Assertion Failed: {} segment losses, expected min {}",
                        losses,
                        min
                    ));
                }
                if let Some(max) = max
                    && losses > *max
                {
                    return Err(anyhow!(
                        "Assertion Failed: {} segment losses, expected max {}",
                        losses,
                        max
                    ));
                }
            }
            TestAssertion::MaxDuration { seconds } => {
                if report.duration_seconds > *seconds {
                    return Err(anyhow!(
                        "Assertion Failed: run lasted {:.1} s, expected at most {:.1} s",
                        report.duration_seconds,
                        seconds
                    ));
                }
            }
            TestAssertion::CwndMax { min, max } => {
                let max_cwnd = report.max_cwnd().unwrap_or(0.0);
                if max_cwnd < *min {
                    return Err(anyhow!(
                        "Assertion Failed: cwnd max {:.2} < expected min {}",
                        max_cwnd,
                        min
                    ));
                }
                if let Some(m) = max
                    && max_cwnd > *m
                {
                    return Err(anyhow!(
                        "Assertion Failed: cwnd max {:.2} > expected max {}",
                        max_cwnd,
                        m
                    ));
                }
            }
            TestAssertion::FinalSsthresh { equals } => {
                let last = report.final_ssthresh();
                if last != Some(*equals) {
                    return Err(anyhow!(
                        "Assertion Failed: final ssthresh {:?}, expected {}",
                        last,
                        equals
                    ));
                }
            }
        }
    }
    Ok(())
}
