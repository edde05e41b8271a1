use std::{
    io,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use crate::engine::Engine;
use crate::trace::{SeriesKind, TraceEvent, series_of};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, List, ListItem, Paragraph},
};

/// A tracing writer that keeps recent log lines in memory while the terminal is in raw mode
#[derive(Clone)]
pub struct MemoryLogBuffer {
    logs: Arc<Mutex<Vec<String>>>,
}

impl Default for MemoryLogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLogBuffer {
    const CAPACITY: usize = 1000;

    pub fn new() -> Self {
        Self {
            logs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, msg: String) {
        let mut logs = self.logs.lock().unwrap_or_else(|e| e.into_inner());
        logs.push(msg);
        if logs.len() > Self::CAPACITY {
            logs.remove(0);
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.logs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl io::Write for MemoryLogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        self.push(s.trim().to_string());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct TuiApp {
    engine: Engine,
    paused: bool,
    scenario_name: Option<String>,
    /// Vertical scroll offset for the trace list
    trace_scroll: usize,
}

impl TuiApp {
    pub fn new(engine: Engine, scenario_name: Option<String>) -> Self {
        Self {
            engine,
            paused: true,
            scenario_name,
            trace_scroll: 0,
        }
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let tick_rate = Duration::from_millis(250);
        let mut last_tick = Instant::now();

        loop {
            terminal.draw(|f| self.ui(f))?;

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_secs(0));

            if crossterm::event::poll(timeout)?
                && let Event::Key(key) = event::read()?
            {
                match key.code {
                    KeyCode::Char('q') => break,
                    KeyCode::Char(' ') => self.paused = !self.paused,
                    KeyCode::Char('s') => {
                        self.engine.step();
                    }
                    KeyCode::Char('f') => self.engine.run_until_complete(),
                    KeyCode::Up => {
                        self.trace_scroll = self.trace_scroll.saturating_add(1);
                    }
                    KeyCode::Down => {
                        self.trace_scroll = self.trace_scroll.saturating_sub(1);
                    }
                    _ => {}
                }
            }

            if last_tick.elapsed() >= tick_rate {
                if !self.paused && !self.engine.step() {
                    self.paused = true;
                }
                last_tick = Instant::now();
            }
        }

        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        Ok(())
    }

    pub fn into_engine(self) -> Engine {
        self.engine
    }

    fn ui(&self, f: &mut Frame) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),  // Control bar
                Constraint::Min(12),    // Window chart
                Constraint::Length(12), // Dashboard + trace
            ])
            .split(f.area());

        self.render_control(f, rows[0]);
        self.render_window_chart(f, rows[1]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(rows[2]);
        self.render_dashboard(f, bottom[0]);
        self.render_trace(f, bottom[1]);
    }

    fn render_control(&self, f: &mut Frame, area: Rect) {
        let scenario = self.scenario_name.as_deref().unwrap_or("Ad-hoc Simulation");
        let status_text = format!(
            "Scenario: {} | Time: {:.1} s | Outcome: {:?} | {} | (q)uit (space)pause/resume (s)tep (f)inish",
            scenario,
            self.engine.current_time(),
            self.engine.outcome(),
            if self.paused { "PAUSED" } else { "RUNNING" },
        );
        let status_block = Paragraph::new(status_text)
            .block(Block::default().borders(Borders::ALL).title("Control"));
        f.render_widget(status_block, area);
    }

    fn render_dashboard(&self, f: &mut Frame, area: Rect) {
        let state = self.engine.state();
        let cfg = self.engine.config();
        let losses = self
            .engine
            .events
            .iter()
            .filter(|e| matches!(e, TraceEvent::SegmentLoss { .. }))
            .count();

        let stats_text = vec![
            Line::from(format!("  Remaining segments: {}", state.remaining_segments)),
            Line::from(format!("  Last sent:          {}", state.last_sent_segments)),
            Line::from(format!("  cwnd:               {:.2}", state.cwnd)),
            Line::from(format!("  ssthresh:           {}", state.ssthresh)),
            Line::from(format!("  rcvwnd:             {}", state.next_rcvwnd_segments)),
            Line::from(format!("  RTO scale:          {}x", state.rto_scale_factor)),
            Line::from(format!("  Segment losses:     {}", losses)),
            Line::from(format!(
                "  MSS={} B, RTT={} s, {} / {}",
                cfg.mss_bytes, cfg.rtt_seconds, cfg.ssthresh_policy, cfg.rto_policy
            )),
        ];

        let stats_block = Paragraph::new(stats_text)
            .block(Block::default().borders(Borders::ALL).title("Dashboard"));
        f.render_widget(stats_block, area);
    }

    fn render_window_chart(&self, f: &mut Frame, area: Rect) {
        let events = &self.engine.events;
        let cwnd = series_of(events, SeriesKind::Cwnd);
        let ssthresh = series_of(events, SeriesKind::Ssthresh);
        let rcvwnd = series_of(events, SeriesKind::Rcvwnd);
        let lost = series_of(events, SeriesKind::SegmentsLost);

        if cwnd.is_empty() && ssthresh.is_empty() {
            let block = Paragraph::new("No window samples yet")
                .block(Block::default().borders(Borders::ALL).title("Window"));
            f.render_widget(block, area);
            return;
        }

        let all = || cwnd.iter().chain(&ssthresh).chain(&rcvwnd).chain(&lost);
        let x_max = all().map(|(x, _)| *x).fold(1.0, f64::max);
        let y_max = all().map(|(_, y)| *y).fold(1.0, f64::max) + 1.0;

        // Each outage is drawn as its own flat segment along the x axis.
        let outages: Vec<Vec<(f64, f64)>> = self
            .engine
            .outage_annotations()
            .iter()
            .map(|o| vec![(o.start_seconds, 0.0), (o.end_seconds.min(x_max), 0.0)])
            .collect();

        let mut datasets = vec![
            Dataset::default()
                .name("cwnd")
                .marker(symbols::Marker::Dot)
                .style(Style::default().fg(Color::Cyan))
                .graph_type(GraphType::Scatter)
                .data(&cwnd),
            Dataset::default()
                .name("ssthresh")
                .marker(symbols::Marker::Braille)
                .style(Style::default().fg(Color::Red))
                .graph_type(GraphType::Line)
                .data(&ssthresh),
            Dataset::default()
                .name("rcvwnd")
                .marker(symbols::Marker::Braille)
                .style(Style::default().fg(Color::Green))
                .graph_type(GraphType::Line)
                .data(&rcvwnd),
            Dataset::default()
                .name("segments lost")
                .marker(symbols::Marker::Block)
                .style(Style::default().fg(Color::Magenta))
                .graph_type(GraphType::Scatter)
                .data(&lost),
        ];
        for (idx, pts) in outages.iter().enumerate() {
            datasets.push(
                Dataset::default()
                    .name(format!("network down #{idx}"))
                    .marker(symbols::Marker::Block)
                    .style(Style::default().fg(Color::Blue).add_modifier(Modifier::DIM))
                    .graph_type(GraphType::Line)
                    .data(pts),
            );
        }

        let x_labels = vec![
            Span::raw("0"),
            Span::raw(format!("{:.1}", x_max / 2.0)),
            Span::raw(format!("{:.1}", x_max)),
        ];
        let y_labels = vec![
            Span::raw("0"),
            Span::raw(format!("{:.0}", y_max / 2.0)),
            Span::raw(format!("{:.0}", y_max)),
        ];

        let chart = Chart::new(datasets)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("cwnd / ssthresh / rcvwnd"),
            )
            .x_axis(
                Axis::default()
                    .title("time (s)")
                    .bounds([0.0, x_max])
                    .labels(x_labels),
            )
            .y_axis(
                Axis::default()
                    .title("segments")
                    .bounds([0.0, y_max])
                    .labels(y_labels),
            );

        f.render_widget(chart, area);
    }

    fn render_trace(&self, f: &mut Frame, area: Rect) {
        let events = &self.engine.events;
        if events.is_empty() {
            let block = Paragraph::new("No trace yet")
                .block(Block::default().borders(Borders::ALL).title("Trace"));
            f.render_widget(block, area);
            return;
        }

        let visible = (area.height.max(3) as usize) - 2; // account for borders
        let total = events.len();
        let scroll = self.trace_scroll.min(total.saturating_sub(visible));
        let start = total.saturating_sub(visible + scroll);
        let end = total.saturating_sub(scroll).max(start);

        let items: Vec<ListItem> = events[start..end]
            .iter()
            .map(|e| {
                let (text, style) = describe(e);
                ListItem::new(Line::from(Span::styled(text, style)))
            })
            .collect();

        let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Trace"));
        f.render_widget(list, area);
    }
}

fn describe(event: &TraceEvent) -> (String, Style) {
    match event {
        TraceEvent::Status(record) => (record.to_string(), Style::default().fg(Color::White)),
        TraceEvent::WindowSample {
            time_seconds,
            ssthresh,
            rcvwnd_segments,
        } => (
            format!("[{time_seconds:.1}]\tssthresh = {ssthresh}\t  rcvwnd = {rcvwnd_segments}"),
            Style::default().fg(Color::Gray),
        ),
        TraceEvent::SegmentLoss {
            time_seconds,
            lost_volume,
        } => (
            format!("[{time_seconds:.1}]\tLOST {lost_volume:.1} segments"),
            Style::default().fg(Color::Red),
        ),
        TraceEvent::Timeout { time_seconds } => (
            format!("[{time_seconds:.1}]\tTIMED OUT, connection closed"),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        TraceEvent::Completed { time_seconds } => (
            format!("[{time_seconds:.1}]\tall data acknowledged"),
            Style::default().fg(Color::Green),
        ),
    }
}
