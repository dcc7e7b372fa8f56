//! `makeup-sched`: load the snapshots, schedule the exams, export the grids.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use makeup_sched::{
    EngineKind, RawInput, SchedulerConfig, export_workbooks, schedule_exams, write_json,
};

#[derive(Debug, Parser)]
#[command(name = "makeup-sched", version, about = "Schedules make-up exams into free timetable slots")]
struct Cli {
    /// Directory holding the input snapshots.
    #[arg(long)]
    data: PathBuf,

    /// Solver configuration (TOML). Defaults apply when the file is absent.
    #[arg(long, default_value = "solver.toml")]
    config: PathBuf,

    /// Directory for the per-course spreadsheets.
    #[arg(long, default_value = "planilhas")]
    out: PathBuf,

    /// Also write the schedule as JSON.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Overrides the engine from the configuration.
    #[arg(long, value_enum)]
    engine: Option<EngineArg>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EngineArg {
    Native,
    CpSat,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Native => EngineKind::Native,
            EngineArg::CpSat => EngineKind::CpSat,
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = SchedulerConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    if let Some(engine) = cli.engine {
        config = config.with_engine(engine.into());
    }

    let raw = RawInput::load(&cli.data, &config.files)
        .with_context(|| format!("reading input snapshots from {}", cli.data.display()))?;
    let (relations, schedule) = schedule_exams(&raw, &config).context("scheduling exams")?;

    if let Some(path) = &cli.json {
        write_json(&schedule, path).context("writing JSON schedule")?;
    }
    export_workbooks(&relations, &raw, &schedule, &cli.out, &config.time_labels)
        .context("exporting spreadsheets")?;

    info!(
        latest_slot = schedule.latest_slot,
        proven_optimal = schedule.proven_optimal,
        out = %cli.out.display(),
        "done"
    );
    Ok(())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
