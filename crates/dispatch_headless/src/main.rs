//! Headless dispatch engine runner.
//!
//! Runs dispatch scenarios without a host simulation attached, for CI
//! verification and configuration tuning.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in demo scenario
//! cargo run -p dispatch_headless -- run
//!
//! # Run a scenario file
//! cargo run -p dispatch_headless -- run --scenario scenarios/downtown.ron
//!
//! # Verify determinism over repeated runs
//! cargo run -p dispatch_headless -- verify --runs 5
//! ```
//!
//! Output (stdout): one JSON summary per run
//! Logs (stderr): human-readable diagnostics

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dispatch_headless::runner::HeadlessRunner;
use dispatch_headless::scenario::Scenario;

#[derive(Parser)]
#[command(name = "dispatch_headless")]
#[command(about = "Headless dispatch engine runner for CI and tuning")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario once and print its summary
    Run {
        /// Scenario RON file (defaults to the built-in demo)
        #[arg(long)]
        scenario: Option<PathBuf>,
        /// Override the scenario's tick count
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Run a scenario repeatedly and fail on any divergence
    Verify {
        /// Scenario RON file (defaults to the built-in demo)
        #[arg(long)]
        scenario: Option<PathBuf>,
        /// Number of runs to compare
        #[arg(long, default_value_t = 3)]
        runs: u32,
    },
}

fn load_scenario(path: Option<&PathBuf>) -> Result<Scenario, String> {
    match path {
        Some(path) => Scenario::load(path).map_err(|e| e.to_string()),
        None => Ok(Scenario::demo()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging goes to stderr; stdout carries the JSON summaries
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Commands::Run { scenario, ticks } => {
            let mut scenario = match load_scenario(scenario.as_ref()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(%e, "failed to load scenario");
                    return ExitCode::FAILURE;
                }
            };
            if let Some(ticks) = ticks {
                scenario.ticks = ticks;
            }
            let summary = HeadlessRunner::new(scenario).run();
            match serde_json::to_string(&summary) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    tracing::error!(%e, "failed to serialize summary");
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Commands::Verify { scenario, runs } => {
            let scenario = match load_scenario(scenario.as_ref()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(%e, "failed to load scenario");
                    return ExitCode::FAILURE;
                }
            };
            let mut summaries = Vec::new();
            for _ in 0..runs.max(1) {
                summaries.push(HeadlessRunner::new(scenario.clone()).run());
            }
            let divergent = summaries.windows(2).any(|w| w[0] != w[1]);
            for summary in &summaries {
                if let Ok(json) = serde_json::to_string(summary) {
                    println!("{json}");
                }
            }
            if divergent {
                tracing::error!(runs, "runs diverged");
                ExitCode::FAILURE
            } else {
                tracing::info!(runs, "all runs identical");
                ExitCode::SUCCESS
            }
        }
    }
}
