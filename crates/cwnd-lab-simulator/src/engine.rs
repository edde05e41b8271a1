use cwnd_lab_abstract::{ConfigError, SimulationConfig};
use tracing::{debug, info, warn};

use crate::rcvwnd::RcvwndTable;
use crate::trace::{OutageAnnotation, Outcome, SimulationReport, StatusRecord, TraceEvent};

/// Base rto scale factor, restored whenever the network is up.
const MIN_RTO_SCALE: u64 = 1;
/// The connection is closed once the rto scale factor reaches this value.
const MAX_RTO_SCALE: u64 = 8;
const MIN_CWND: f64 = 1.0;
const MIN_SSTHRESH: u64 = 1;

/// Mutable per-run state of the sender.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    /// RTTs elapsed.
    pub tick: u64,
    pub remaining_segments: u64,
    pub cwnd: f64,
    pub ssthresh: u64,
    pub current_rcvwnd_segments: u64,
    pub next_rcvwnd_segments: u64,
    pub rto_scale_factor: u64,
    /// Segments attempted by the most recent step.
    pub last_sent_segments: u64,
}

/// Discrete-time congestion control engine, advanced one RTT per [`Engine::step`].
pub struct Engine {
    config: SimulationConfig,
    rcvwnd: RcvwndTable,
    base_rto_ticks: u64,
    state: SimulationState,
    outcome: Outcome,

    /// Everything emitted so far, in order.
    pub events: Vec<TraceEvent>,
}

impl Engine {
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let rcvwnd = RcvwndTable::from_config(&config);
        let ssthresh = initial_ssthresh(&config);
        let state = SimulationState {
            tick: 0,
            remaining_segments: config.total_segments(),
            cwnd: MIN_CWND,
            ssthresh,
            current_rcvwnd_segments: rcvwnd.initial(),
            next_rcvwnd_segments: rcvwnd.window_at(0),
            rto_scale_factor: MIN_RTO_SCALE,
            last_sent_segments: 0,
        };

        debug!(
            "Engine ready: {} segments, ssthresh={}, rcvwnd={}",
            state.remaining_segments, state.ssthresh, state.next_rcvwnd_segments
        );

        Ok(Self {
            base_rto_ticks: config.rto_policy.rtt_multiple(),
            config,
            rcvwnd,
            state,
            outcome: Outcome::Running,
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Simulated time of the current tick.
    pub fn current_time(&self) -> f64 {
        self.time_of(self.state.tick)
    }

    fn time_of(&self, tick: u64) -> f64 {
        tick as f64 * self.config.rtt_seconds
    }

    /// True if `time` lies in an outage, or within one RTT of its start
    /// (segments sent then would be acknowledged during the outage).
    pub fn is_network_down(&self, time: f64) -> bool {
        let rtt = self.config.rtt_seconds;
        self.config
            .outages
            .iter()
            .any(|o| o.contains(time) || (time - o.start).abs() < rtt)
    }

    /// Outage intervals for annotation, in configuration order.
    pub fn outage_annotations(&self) -> Vec<OutageAnnotation> {
        self.config
            .outages
            .iter()
            .enumerate()
            .map(|(index, o)| OutageAnnotation {
                index,
                start_seconds: o.start,
                end_seconds: o.end,
            })
            .collect()
    }

    /// Advance by one tick. Returns false once the run has terminated.
    pub fn step(&mut self) -> bool {
        if self.outcome.is_terminal() {
            return false;
        }

        let sent = (self.state.cwnd as u64).min(self.state.remaining_segments);
        self.state.last_sent_segments = sent;

        if self.is_network_down(self.current_time()) {
            self.on_segments_lost(sent);
        } else {
            self.on_segments_acked(sent);
        }
        true
    }

    pub fn run_until_complete(&mut self) {
        while self.step() {}
    }

    fn on_segments_acked(&mut self, sent: u64) {
        self.state.rto_scale_factor = MIN_RTO_SCALE;

        if self.state.remaining_segments == 0 {
            self.push_status(0);
            let time_seconds = self.current_time();
            info!("All data acknowledged at [{:.1}]", time_seconds);
            self.events.push(TraceEvent::Completed { time_seconds });
            self.outcome = Outcome::Completed;
            return;
        }

        self.state.remaining_segments -= sent;
        self.push_status(sent);

        let next_tick = self.state.tick + 1;
        self.state.current_rcvwnd_segments = self.state.next_rcvwnd_segments;
        self.state.next_rcvwnd_segments = self.rcvwnd.window_at(next_tick);
        if self.state.current_rcvwnd_segments != self.state.next_rcvwnd_segments {
            debug!(
                "rcvwnd changes from {} to {} at [{:.1}]",
                self.state.current_rcvwnd_segments,
                self.state.next_rcvwnd_segments,
                self.time_of(next_tick)
            );
        }

        let ceiling = self.state.next_rcvwnd_segments as f64;
        let cwnd = self.state.cwnd;
        self.state.cwnd = if cwnd < self.state.ssthresh as f64 {
            (cwnd + sent as f64)
                .min(self.state.ssthresh as f64)
                .min(ceiling)
        } else {
            (cwnd + sent as f64 / cwnd).min(ceiling)
        };

        self.state.tick = next_tick;
    }

    fn on_segments_lost(&mut self, sent: u64) {
        // The attempted send is reported, but the segments stay queued for retransmission.
        let attempted = StatusRecord {
            remaining_segments: self.state.remaining_segments - sent,
            ..self.status_record(sent)
        };
        debug!("{}", attempted);
        self.events.push(TraceEvent::Status(attempted));

        let lost_volume = self.state.cwnd;
        let loss_time = self.current_time();
        self.state.ssthresh = MIN_SSTHRESH.max(lost_volume as u64 / 2);
        self.state.cwnd = MIN_CWND;
        self.events.push(TraceEvent::SegmentLoss {
            time_seconds: loss_time,
            lost_volume,
        });

        let wait = self.state.rto_scale_factor * self.base_rto_ticks;
        self.state.tick += wait;
        info!(
            "Segments sent at [{:.1}] were lost, waiting RTO until [{:.1}] ({}x base RTO)",
            loss_time,
            self.current_time(),
            self.state.rto_scale_factor
        );
        self.state.rto_scale_factor *= 2;

        let time_seconds = self.current_time();
        if self.state.rto_scale_factor == MAX_RTO_SCALE {
            warn!(
                "Reached maximum RTO ({}x base RTO) and timed out, connection closed at [{:.1}]",
                MAX_RTO_SCALE / 2,
                time_seconds
            );
            self.events.push(TraceEvent::Timeout { time_seconds });
            self.outcome = Outcome::TimedOut;
            return;
        }

        self.events.push(TraceEvent::WindowSample {
            time_seconds,
            ssthresh: self.state.ssthresh,
            rcvwnd_segments: self.state.next_rcvwnd_segments,
        });
    }

    fn status_record(&self, sent: u64) -> StatusRecord {
        StatusRecord {
            time_seconds: self.current_time(),
            remaining_segments: self.state.remaining_segments,
            sent_segments: sent,
            cwnd: self.state.cwnd,
            ssthresh: self.state.ssthresh,
            rcvwnd_segments: self.state.next_rcvwnd_segments,
        }
    }

    fn push_status(&mut self, sent: u64) {
        let record = self.status_record(sent);
        debug!("{}", record);
        self.events.push(TraceEvent::Status(record));
    }

    /// Produce a serializable snapshot of the run so far.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            outcome: self.outcome,
            duration_seconds: self.current_time(),
            events: self.events.clone(),
            outages: self.outage_annotations(),
        }
    }

    pub fn into_report(self) -> SimulationReport {
        SimulationReport {
            outcome: self.outcome,
            duration_seconds: self.current_time(),
            outages: self.outage_annotations(),
            config: self.config,
            events: self.events,
        }
    }
}

/// Validate `config`, run it to a terminal state and return the full trace.
pub fn simulate(config: SimulationConfig) -> Result<SimulationReport, ConfigError> {
    let mut engine = Engine::new(config)?;
    engine.run_until_complete();
    Ok(engine.into_report())
}

/// `max(1, floor(bytes / divisor / mss))` of the window effective at tick 0.
fn initial_ssthresh(config: &SimulationConfig) -> u64 {
    let rtt = config.rtt_seconds;
    let first_bytes = config
        .receiver_windows
        .iter()
        .take_while(|w| ((w.at / rtt) as u64) == 0)
        .last()
        .map(|w| w.bytes)
        .unwrap_or(0);
    MIN_SSTHRESH.max(first_bytes / config.ssthresh_policy.divisor() / config.mss_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwnd_lab_abstract::{Outage, RcvwndAnnouncement, SsthreshPolicy};

    fn config(outages: Vec<Outage>) -> SimulationConfig {
        SimulationConfig {
            receiver_windows: vec![RcvwndAnnouncement::new(0.0, 12_000)],
            outages,
            ..Default::default()
        }
    }

    #[test]
    fn initial_state_follows_policy() {
        let engine = Engine::new(config(Vec::new())).unwrap();
        assert_eq!(engine.state().ssthresh, 8);
        assert_eq!(engine.state().cwnd, 1.0);
        assert_eq!(engine.state().rto_scale_factor, 1);
        assert_eq!(engine.state().remaining_segments, 64);

        let half = SimulationConfig {
            ssthresh_policy: SsthreshPolicy::HalfInitialRcvwnd,
            ..config(Vec::new())
        };
        assert_eq!(Engine::new(half).unwrap().state().ssthresh, 4);
    }

    #[test]
    fn initial_ssthresh_never_drops_below_one() {
        let cfg = SimulationConfig {
            ssthresh_policy: SsthreshPolicy::HalfInitialRcvwnd,
            receiver_windows: vec![RcvwndAnnouncement::new(0.0, 1_500)],
            ..config(Vec::new())
        };
        assert_eq!(Engine::new(cfg).unwrap().state().ssthresh, 1);
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let cfg = config(vec![Outage::new(1.0, 5.0), Outage::new(4.0, 6.0)]);
        assert!(matches!(
            Engine::new(cfg),
            Err(ConfigError::OverlappingOutages { .. })
        ));
    }

    #[test]
    fn look_ahead_marks_one_rtt_before_outage() {
        let engine = Engine::new(config(vec![Outage::new(8.5, 9.5)])).unwrap();
        assert!(!engine.is_network_down(7.0));
        assert!(!engine.is_network_down(7.5));
        assert!(engine.is_network_down(7.6));
        assert!(engine.is_network_down(8.0));
        assert!(engine.is_network_down(9.0));
        assert!(!engine.is_network_down(9.5));
        assert!(!engine.is_network_down(10.0));
    }

    #[test]
    fn slow_start_doubles_until_ssthresh() {
        let mut engine = Engine::new(config(Vec::new())).unwrap();
        let mut windows = vec![engine.state().cwnd];
        for _ in 0..4 {
            engine.step();
            windows.push(engine.state().cwnd);
        }
        assert_eq!(windows, vec![1.0, 2.0, 4.0, 8.0, 8.0]);
        assert_eq!(engine.state().tick, 4);
    }

    #[test]
    fn congestion_avoidance_grows_by_sent_over_cwnd() {
        let cfg = SimulationConfig {
            receiver_windows: vec![RcvwndAnnouncement::new(0.0, 12_000)],
            ssthresh_policy: SsthreshPolicy::HalfInitialRcvwnd,
            ..config(Vec::new())
        };
        let mut engine = Engine::new(cfg).unwrap();
        // 1 -> 2 -> 4 in slow start, then 4 + 4/4 and 5 + 5/5.
        for _ in 0..4 {
            engine.step();
        }
        assert_eq!(engine.state().cwnd, 6.0);
    }

    #[test]
    fn receiver_window_caps_growth() {
        let cfg = SimulationConfig {
            receiver_windows: vec![
                RcvwndAnnouncement::new(0.0, 12_000),
                RcvwndAnnouncement::new(2.0, 4_500),
            ],
            ..config(Vec::new())
        };
        let mut engine = Engine::new(cfg).unwrap();
        engine.step(); // tick 0 -> 1, next window is still 8
        assert_eq!(engine.state().cwnd, 2.0);
        engine.step(); // tick 1 -> 2, next window is now 3
        assert_eq!(engine.state().next_rcvwnd_segments, 3);
        assert_eq!(engine.state().cwnd, 3.0);
    }

    #[test]
    fn loss_halves_ssthresh_and_resets_cwnd() {
        let mut engine = Engine::new(config(vec![Outage::new(3.5, 4.0)])).unwrap();
        for _ in 0..3 {
            engine.step();
        }
        assert_eq!(engine.state().cwnd, 8.0);
        let remaining = engine.state().remaining_segments;

        engine.step();
        let state = engine.state();
        assert_eq!(state.ssthresh, 4);
        assert_eq!(state.cwnd, 1.0);
        assert_eq!(state.rto_scale_factor, 2);
        assert_eq!(state.tick, 5);
        assert_eq!(state.remaining_segments, remaining);
        assert!(engine.events.contains(&TraceEvent::SegmentLoss {
            time_seconds: 3.0,
            lost_volume: 8.0
        }));
        assert!(matches!(
            engine.events.last(),
            Some(TraceEvent::WindowSample {
                time_seconds,
                ssthresh: 4,
                ..
            }) if *time_seconds == 5.0
        ));
    }

    #[test]
    fn step_is_a_no_op_after_termination() {
        let mut engine = Engine::new(config(Vec::new())).unwrap();
        engine.run_until_complete();
        assert_eq!(engine.outcome(), Outcome::Completed);
        let len = engine.events.len();
        assert!(!engine.step());
        assert_eq!(engine.events.len(), len);
    }
}
