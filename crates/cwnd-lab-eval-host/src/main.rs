use anyhow::{Result, bail};
use clap::Parser;
use cwnd_lab_simulator::{SimulationReport, scenario_runner};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless grader for congestion window scenarios")]
struct Args {
    /// Scenario TOML files to execute.
    #[arg(required = true)]
    scenarios: Vec<PathBuf>,

    /// Keep running the remaining scenarios after a failure.
    #[arg(long, default_value_t = false)]
    keep_going: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    info!("cwnd-lab-eval-host starting...");

    let mut failed = 0usize;
    for path in &args.scenarios {
        match scenario_runner::run_scenario(path) {
            Ok(report) => log_summary(&report),
            Err(err) => {
                error!("{}: {err:#}", path.display());
                failed += 1;
                if !args.keep_going {
                    break;
                }
            }
        }
    }

    if failed > 0 {
        bail!("{failed} scenario(s) failed");
    }
    info!("{} scenario(s) passed", args.scenarios.len());
    Ok(())
}

fn log_summary(report: &SimulationReport) {
    info!(
        "Outcome: {:?} | duration: {:.1} s | segment losses: {} | status records: {}",
        report.outcome,
        report.duration_seconds,
        report.loss_count(),
        report.status_records().count()
    );
}
