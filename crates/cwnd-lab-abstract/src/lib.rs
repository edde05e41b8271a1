pub mod config;
pub mod error;
pub mod scenario;

pub use config::{Outage, RcvwndAnnouncement, RtoPolicy, SimulationConfig, SsthreshPolicy};
pub use error::ConfigError;
pub use scenario::{ExpectedOutcome, SimulationConfigOverride, TestAssertion, TestScenario};
