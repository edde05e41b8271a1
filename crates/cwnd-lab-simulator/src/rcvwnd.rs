use cwnd_lab_abstract::SimulationConfig;

/// Receiver window schedule materialized per tick, in segments.
///
/// Announcements are placed on the tick `trunc(at / rtt)`; several
/// announcements falling on the same tick collapse onto the last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcvwndTable {
    /// Sorted by tick, first entry always at tick 0.
    entries: Vec<(u64, u64)>,
}

impl RcvwndTable {
    /// Build the table from an already validated configuration.
    pub fn from_config(config: &SimulationConfig) -> Self {
        let mut entries: Vec<(u64, u64)> = Vec::with_capacity(config.receiver_windows.len());
        for announcement in &config.receiver_windows {
            let tick = (announcement.at / config.rtt_seconds) as u64;
            let segments = announcement.bytes / config.mss_bytes;
            match entries.last_mut() {
                Some(last) if last.0 == tick => last.1 = segments,
                _ => entries.push((tick, segments)),
            }
        }
        Self { entries }
    }

    /// Most recently announced window at or before `tick`.
    pub fn window_at(&self, tick: u64) -> u64 {
        let idx = self.entries.partition_point(|(t, _)| *t <= tick);
        match idx {
            0 => self.initial(),
            i => self.entries[i - 1].1,
        }
    }

    /// Window announced at tick 0.
    pub fn initial(&self) -> u64 {
        self.entries.first().map(|(_, w)| *w).unwrap_or(0)
    }
}
