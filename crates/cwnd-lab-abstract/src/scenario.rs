use serde::Deserialize;

use crate::config::{Outage, RcvwndAnnouncement, RtoPolicy, SimulationConfig, SsthreshPolicy};

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: SimulationConfigOverride,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

impl TestScenario {
    /// The scenario's configuration layered over [`SimulationConfig::default`].
    pub fn simulation_config(&self) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        self.config.apply_to(&mut config);
        config
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimulationConfigOverride {
    pub mss_bytes: Option<u64>,
    pub total_data_bytes: Option<u64>,
    pub ssthresh_policy: Option<SsthreshPolicy>,
    pub rtt_seconds: Option<f64>,
    pub rto_policy: Option<RtoPolicy>,
    pub receiver_windows: Option<Vec<RcvwndAnnouncement>>,
    pub outages: Option<Vec<Outage>>,
}

impl SimulationConfigOverride {
    pub fn apply_to(&self, config: &mut SimulationConfig) {
        if let Some(v) = self.mss_bytes {
            config.mss_bytes = v;
        }
        if let Some(v) = self.total_data_bytes {
            config.total_data_bytes = v;
        }
        if let Some(v) = self.ssthresh_policy {
            config.ssthresh_policy = v;
        }
        if let Some(v) = self.rtt_seconds {
            config.rtt_seconds = v;
        }
        if let Some(v) = self.rto_policy {
            config.rto_policy = v;
        }
        if let Some(v) = &self.receiver_windows {
            config.receiver_windows = v.clone();
        }
        if let Some(v) = &self.outages {
            config.outages = v.clone();
        }
    }
}

/// Terminal state a scenario expects the run to reach.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedOutcome {
    Completed,
    TimedOut,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Assert how the run terminated
    Outcome { expected: ExpectedOutcome },
    /// Assert that the number of segment-loss events is within range
    LossCount { min: u32, max: Option<u32> },
    /// Assert that the run ends no later than the given simulated time
    MaxDuration { seconds: f64 },
    /// Assert that the largest cwnd seen in status records is within range
    CwndMax { min: f64, max: Option<f64> },
    /// Assert the ssthresh reported by the last status or window sample
    FinalSsthresh { equals: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
name = "long outage"
description = "the network never comes back"

[config]
total_data_bytes = 48000
receiver_windows = [{ at = 0.0, bytes = 12000 }]
outages = [{ start = 2.0, end = 30.0 }]
ssthresh_policy = "half_initial_rcvwnd"

[[assertions]]
type = "outcome"
expected = "timed_out"

[[assertions]]
type = "loss_count"
min = 3
"#;

    #[test]
    fn parses_scenario_and_layers_over_defaults() {
        let scenario: TestScenario = toml::from_str(SCENARIO).unwrap();
        assert_eq!(scenario.name, "long outage");
        assert_eq!(scenario.assertions.len(), 2);
        assert!(matches!(
            scenario.assertions[0],
            TestAssertion::Outcome {
                expected: ExpectedOutcome::TimedOut
            }
        ));

        let config = scenario.simulation_config();
        assert_eq!(config.mss_bytes, 1500);
        assert_eq!(config.total_data_bytes, 48_000);
        assert_eq!(config.ssthresh_policy, SsthreshPolicy::HalfInitialRcvwnd);
        assert_eq!(config.receiver_windows, vec![RcvwndAnnouncement::new(0.0, 12_000)]);
        assert_eq!(config.outages, vec![Outage::new(2.0, 30.0)]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_policy_is_rejected_while_parsing() {
        let text = r#"
name = "bad"
[config]
rto_policy = "triple_rtt"
"#;
        let err = toml::from_str::<TestScenario>(text).unwrap_err();
        assert!(err.to_string().contains("unsupported RTO policy"));

        let text = r#"
name = "bad"
[config]
ssthresh_policy = "quarter"
"#;
        let err = toml::from_str::<TestScenario>(text).unwrap_err();
        assert!(err.to_string().contains("unsupported ssthresh policy 'quarter'"));
    }
}
