use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How the initial ssthresh is derived from the first advertised receiver window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum SsthreshPolicy {
    /// ssthresh equals the initial rcvwnd.
    #[default]
    FullInitialRcvwnd,
    /// ssthresh equals half of the initial rcvwnd.
    HalfInitialRcvwnd,
}

impl SsthreshPolicy {
    /// Ratio rcvwnd / ssthresh.
    pub fn divisor(self) -> u64 {
        match self {
            SsthreshPolicy::FullInitialRcvwnd => 1,
            SsthreshPolicy::HalfInitialRcvwnd => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SsthreshPolicy::FullInitialRcvwnd => "full_initial_rcvwnd",
            SsthreshPolicy::HalfInitialRcvwnd => "half_initial_rcvwnd",
        }
    }
}

impl FromStr for SsthreshPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full_initial_rcvwnd" => Ok(SsthreshPolicy::FullInitialRcvwnd),
            "half_initial_rcvwnd" => Ok(SsthreshPolicy::HalfInitialRcvwnd),
            other => Err(ConfigError::UnsupportedSsthreshPolicy(other.to_string())),
        }
    }
}

impl TryFrom<String> for SsthreshPolicy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for SsthreshPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retransmission timeout policy. Only one value is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum RtoPolicy {
    #[default]
    DoubleRtt,
}

impl RtoPolicy {
    /// Ratio rto / rtt, i.e. the base RTO wait measured in ticks.
    pub fn rtt_multiple(self) -> u64 {
        match self {
            RtoPolicy::DoubleRtt => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RtoPolicy::DoubleRtt => "double_rtt",
        }
    }
}

impl FromStr for RtoPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "double_rtt" => Ok(RtoPolicy::DoubleRtt),
            other => Err(ConfigError::UnsupportedRtoPolicy(other.to_string())),
        }
    }
}

impl TryFrom<String> for RtoPolicy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for RtoPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A receiver window announced at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RcvwndAnnouncement {
    /// Seconds since the start of the transmission.
    pub at: f64,
    /// Advertised window in bytes.
    pub bytes: u64,
}

impl RcvwndAnnouncement {
    pub fn new(at: f64, bytes: u64) -> Self {
        Self { at, bytes }
    }
}

/// A half-open interval `[start, end)` in seconds during which the network is down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outage {
    pub start: f64,
    pub end: f64,
}

impl Outage {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }

    fn overlaps(&self, other: &Outage) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub mss_bytes: u64,
    pub total_data_bytes: u64,
    #[serde(default)]
    pub ssthresh_policy: SsthreshPolicy,
    pub rtt_seconds: f64,
    #[serde(default)]
    pub rto_policy: RtoPolicy,
    /// Receiver window schedule, the entry at `at = 0` is mandatory.
    pub receiver_windows: Vec<RcvwndAnnouncement>,
    #[serde(default)]
    pub outages: Vec<Outage>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mss_bytes: 1500,
            total_data_bytes: 96_000,
            ssthresh_policy: SsthreshPolicy::FullInitialRcvwnd,
            rtt_seconds: 1.0,
            rto_policy: RtoPolicy::DoubleRtt,
            receiver_windows: vec![
                RcvwndAnnouncement::new(0.0, 12_000),
                RcvwndAnnouncement::new(4.0, 24_000),
                RcvwndAnnouncement::new(8.0, 9_000),
            ],
            outages: vec![Outage::new(8.5, 9.5)],
        }
    }
}

impl SimulationConfig {
    /// Number of whole segments to transfer.
    pub fn total_segments(&self) -> u64 {
        self.total_data_bytes / self.mss_bytes
    }

    /// Check every construction-time invariant, reporting the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mss_bytes == 0 {
            return Err(ConfigError::NonPositiveMss);
        }
        if self.total_data_bytes == 0 {
            return Err(ConfigError::NonPositiveData);
        }
        if !(self.rtt_seconds.is_finite() && self.rtt_seconds > 0.0) {
            return Err(ConfigError::NonPositiveRtt(self.rtt_seconds));
        }

        self.validate_receiver_windows()?;
        self.validate_outages()
    }

    fn validate_receiver_windows(&self) -> Result<(), ConfigError> {
        let first = self
            .receiver_windows
            .first()
            .ok_or(ConfigError::EmptyReceiverWindows)?;
        if first.at != 0.0 {
            return Err(ConfigError::MissingInitialReceiverWindow(first.at));
        }

        for (index, entry) in self.receiver_windows.iter().enumerate() {
            if !(entry.at.is_finite() && entry.at >= 0.0) {
                return Err(ConfigError::InvalidReceiverWindowTime {
                    index,
                    at: entry.at,
                });
            }
            if entry.bytes == 0 {
                return Err(ConfigError::NonPositiveReceiverWindow { index });
            }
            if entry.bytes < self.mss_bytes {
                return Err(ConfigError::ReceiverWindowBelowMss {
                    index,
                    bytes: entry.bytes,
                    mss: self.mss_bytes,
                });
            }
        }

        for (index, pair) in self.receiver_windows.windows(2).enumerate() {
            if pair[1].at <= pair[0].at {
                return Err(ConfigError::UnorderedReceiverWindows {
                    index: index + 1,
                    at: pair[1].at,
                    previous: pair[0].at,
                });
            }
        }

        Ok(())
    }

    fn validate_outages(&self) -> Result<(), ConfigError> {
        for (index, outage) in self.outages.iter().enumerate() {
            let bounds_ok = outage.start.is_finite()
                && outage.end.is_finite()
                && outage.start >= 0.0
                && outage.end > outage.start;
            if !bounds_ok {
                return Err(ConfigError::MalformedOutage {
                    index,
                    start: outage.start,
                    end: outage.end,
                });
            }
        }

        let mut sorted: Vec<(usize, &Outage)> = self.outages.iter().enumerate().collect();
        sorted.sort_by(|a, b| a.1.start.total_cmp(&b.1.start));
        for pair in sorted.windows(2) {
            let (first, a) = pair[0];
            let (second, b) = pair[1];
            if a.overlaps(b) {
                return Err(ConfigError::OverlappingOutages {
                    first: first.min(second),
                    second: first.max(second),
                });
            }
        }

        Ok(())
    }
}
