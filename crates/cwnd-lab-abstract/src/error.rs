use thiserror::Error;

/// A violated construction-time rule of [`crate::SimulationConfig`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("non-positive MSS")]
    NonPositiveMss,
    #[error("non-positive total data")]
    NonPositiveData,
    #[error("non-positive RTT ({0})")]
    NonPositiveRtt(f64),
    #[error("empty receiver window schedule")]
    EmptyReceiverWindows,
    #[error("receiver window schedule must start at 0 (first entry at {0})")]
    MissingInitialReceiverWindow(f64),
    #[error("invalid receiver window timestamp {at} at entry {index}")]
    InvalidReceiverWindowTime { index: usize, at: f64 },
    #[error("non-positive receiver window at entry {index}")]
    NonPositiveReceiverWindow { index: usize },
    #[error("receiver window of {bytes} bytes at entry {index} is smaller than one segment ({mss} bytes)")]
    ReceiverWindowBelowMss { index: usize, bytes: u64, mss: u64 },
    #[error(
        "overlapping receiver windows: entry {index} at {at} does not come after {previous}"
    )]
    UnorderedReceiverWindows { index: usize, at: f64, previous: f64 },
    #[error("malformed outage interval {index}: [{start}, {end})")]
    MalformedOutage { index: usize, start: f64, end: f64 },
    #[error("overlapping outage intervals {first} and {second}")]
    OverlappingOutages { first: usize, second: usize },
    #[error("unsupported ssthresh policy '{0}'")]
    UnsupportedSsthreshPolicy(String),
    #[error("unsupported RTO policy '{0}'")]
    UnsupportedRtoPolicy(String),
}
