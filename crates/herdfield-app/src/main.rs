use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use herdfield_app::{Scenario, ScenarioReport, run_scenario};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "herdfield",
    version,
    about = "Run potential-field herd movement scenarios and print a JSON report"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scenario described by a JSON file.
    Run {
        /// Path to the scenario JSON.
        scenario: PathBuf,
        /// Override the scenario's cycle count.
        #[arg(long)]
        cycles: Option<u32>,
        /// Pretty-print the report.
        #[arg(long)]
        pretty: bool,
    },
    /// Run the built-in Bor South scenario.
    Demo {
        #[arg(long)]
        cycles: Option<u32>,
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let (scenario, cycles, pretty) = match cli.command {
        Command::Run {
            scenario,
            cycles,
            pretty,
        } => (Scenario::load(&scenario)?, cycles, pretty),
        Command::Demo { cycles, pretty } => {
            info!("using built-in demo scenario");
            (Scenario::demo(), cycles, pretty)
        }
    };
    let report = run_scenario(&scenario, cycles)?;
    emit(&report, pretty)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}

fn emit(report: &ScenarioReport, pretty: bool) -> Result<()> {
    let encoded = if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    }
    .context("failed to encode report")?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{encoded}").context("failed to write report")?;
    Ok(())
}
