use std::fmt;

use cwnd_lab_abstract::SimulationConfig;
use serde::Serialize;

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Running,
    /// All data acknowledged.
    Completed,
    /// RTO cutoff reached, connection closed with data outstanding.
    TimedOut,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Outcome::Running)
    }
}

/// Sender status at one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRecord {
    pub time_seconds: f64,
    pub remaining_segments: u64,
    pub sent_segments: u64,
    pub cwnd: f64,
    pub ssthresh: u64,
    pub rcvwnd_segments: u64,
}

impl fmt::Display for StatusRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.1}]\tremaining = {}\t   sent = {}\t   cwnd = {:.1}\tssthresh = {}\t  rcvwnd = {}",
            self.time_seconds,
            self.remaining_segments,
            self.sent_segments,
            self.cwnd,
            self.ssthresh,
            self.rcvwnd_segments
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    Status(StatusRecord),
    /// ssthresh and rcvwnd after an RTO wait; cwnd was just reset so it is not sampled.
    WindowSample {
        time_seconds: f64,
        ssthresh: u64,
        rcvwnd_segments: u64,
    },
    SegmentLoss {
        time_seconds: f64,
        lost_volume: f64,
    },
    Timeout {
        time_seconds: f64,
    },
    Completed {
        time_seconds: f64,
    },
}

impl TraceEvent {
    pub fn time_seconds(&self) -> f64 {
        match self {
            TraceEvent::Status(record) => record.time_seconds,
            TraceEvent::WindowSample { time_seconds, .. }
            | TraceEvent::SegmentLoss { time_seconds, .. }
            | TraceEvent::Timeout { time_seconds }
            | TraceEvent::Completed { time_seconds } => *time_seconds,
        }
    }

    /// ssthresh carried by status records and window samples.
    pub fn ssthresh(&self) -> Option<u64> {
        match self {
            TraceEvent::Status(record) => Some(record.ssthresh),
            TraceEvent::WindowSample { ssthresh, .. } => Some(*ssthresh),
            _ => None,
        }
    }

    /// Receiver window carried by status records and window samples.
    pub fn rcvwnd_segments(&self) -> Option<u64> {
        match self {
            TraceEvent::Status(record) => Some(record.rcvwnd_segments),
            TraceEvent::WindowSample {
                rcvwnd_segments, ..
            } => Some(*rcvwnd_segments),
            _ => None,
        }
    }
}

/// An outage interval, numbered in configuration order, for annotating plots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutageAnnotation {
    pub index: usize,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

/// Which value a time series samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Cwnd,
    Ssthresh,
    Rcvwnd,
    SegmentsLost,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimulationConfig,
    pub outcome: Outcome,
    pub duration_seconds: f64,
    pub events: Vec<TraceEvent>,
    pub outages: Vec<OutageAnnotation>,
}

impl SimulationReport {
    pub fn status_records(&self) -> impl Iterator<Item = &StatusRecord> {
        self.events.iter().filter_map(|e| match e {
            TraceEvent::Status(record) => Some(record),
            _ => None,
        })
    }

    /// `(time_seconds, lost_volume)` of every segment-loss event.
    pub fn loss_events(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.events.iter().filter_map(|e| match e {
            TraceEvent::SegmentLoss {
                time_seconds,
                lost_volume,
            } => Some((*time_seconds, *lost_volume)),
            _ => None,
        })
    }

    pub fn loss_count(&self) -> usize {
        self.loss_events().count()
    }

    pub fn max_cwnd(&self) -> Option<f64> {
        self.status_records().map(|r| r.cwnd).reduce(f64::max)
    }

    /// ssthresh from the last status record or window sample.
    pub fn final_ssthresh(&self) -> Option<u64> {
        self.events.iter().rev().find_map(TraceEvent::ssthresh)
    }
}

/// `(time_seconds, value)` points for one series, in trace order.
pub fn series_of(events: &[TraceEvent], kind: SeriesKind) -> Vec<(f64, f64)> {
    events
        .iter()
        .filter_map(|e| {
            let value = match (kind, e) {
                (SeriesKind::Cwnd, TraceEvent::Status(record)) => record.cwnd,
                (SeriesKind::Ssthresh, _) => e.ssthresh()? as f64,
                (SeriesKind::Rcvwnd, _) => e.rcvwnd_segments()? as f64,
                (SeriesKind::SegmentsLost, TraceEvent::SegmentLoss { lost_volume, .. }) => {
                    *lost_volume
                }
                _ => return None,
            };
            Some((e.time_seconds(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(time: f64, cwnd: f64, ssthresh: u64) -> StatusRecord {
        StatusRecord {
            time_seconds: time,
            remaining_segments: 10,
            sent_segments: 2,
            cwnd,
            ssthresh,
            rcvwnd_segments: 8,
        }
    }

    #[test]
    fn status_line_uses_one_decimal() {
        let line = record(2.0, 6.833_333, 4).to_string();
        assert_eq!(
            line,
            "[2.0]\tremaining = 10\t   sent = 2\t   cwnd = 6.8\tssthresh = 4\t  rcvwnd = 8"
        );
    }

    #[test]
    fn series_skip_events_without_the_value() {
        let events = vec![
            TraceEvent::Status(record(0.0, 1.0, 8)),
            TraceEvent::SegmentLoss {
                time_seconds: 1.0,
                lost_volume: 2.0,
            },
            TraceEvent::WindowSample {
                time_seconds: 3.0,
                ssthresh: 1,
                rcvwnd_segments: 8,
            },
            TraceEvent::Timeout { time_seconds: 3.0 },
        ];
        assert_eq!(series_of(&events, SeriesKind::Cwnd), vec![(0.0, 1.0)]);
        assert_eq!(
            series_of(&events, SeriesKind::Ssthresh),
            vec![(0.0, 8.0), (3.0, 1.0)]
        );
        assert_eq!(
            series_of(&events, SeriesKind::SegmentsLost),
            vec![(1.0, 2.0)]
        );
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(TraceEvent::Timeout { time_seconds: 16.0 }).unwrap();
        assert_eq!(json["type"], "timeout");
        assert_eq!(json["time_seconds"], 16.0);

        let json = serde_json::to_value(TraceEvent::Status(record(1.0, 2.0, 8))).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["cwnd"], 2.0);
    }
}
