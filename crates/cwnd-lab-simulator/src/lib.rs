pub mod engine;
pub mod rcvwnd;

#[cfg(feature = "tui")]
pub mod tui;

pub mod scenario_runner;
pub mod trace;

pub use engine::{Engine, SimulationState, simulate};
pub use rcvwnd::RcvwndTable;
pub use trace::{
    OutageAnnotation, Outcome, SeriesKind, SimulationReport, StatusRecord, TraceEvent,
};
