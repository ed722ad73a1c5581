//! # tether
//!
//! Command-line driver for the tether causality engine. Runs synthetic
//! asynchronous workloads against a fresh engine and prints the stitched
//! traces and causal forest it recorded.

#![deny(unsafe_code)]

mod simulate;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tether_settings::TetherSettings;

use crate::simulate::{FrameSource, Report};

/// Upper bound on `--length` and `--width`.
const MAX_WORKLOAD: u64 = 1_000_000;

/// Causal async stack traces.
#[derive(Parser, Debug)]
#[command(name = "tether", version, about = "Causal async stack trace engine")]
struct Cli {
    /// Settings file (defaults to `~/.tether/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log level, overriding the settings file (`RUST_LOG` still wins).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a synthetic workload and print what the engine recorded.
    Simulate {
        /// Capture this process's real stack instead of synthetic frames.
        #[arg(long)]
        backtrace: bool,

        #[command(subcommand)]
        workload: Workload,
    },
    /// Print the effective settings as JSON.
    Settings,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Workload {
    /// A linear chain of contexts, each destroyed once its successor exists.
    Chain {
        /// Number of contexts in the chain.
        #[arg(
            long,
            default_value_t = 5,
            value_parser = clap::value_parser!(u64).range(..=MAX_WORKLOAD)
        )]
        length: u64,
    },
    /// One context spawning many children.
    FanOut {
        /// Number of children.
        #[arg(
            long,
            default_value_t = 20,
            value_parser = clap::value_parser!(u64).range(..=MAX_WORKLOAD)
        )]
        width: u64,
    },
    /// Two contexts that each report the other as their trigger.
    Cycle,
}

impl Cli {
    fn load_settings(&self) -> Result<TetherSettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(tether_settings::settings_path);
        tether_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))
    }
}

fn run_workload(settings: &TetherSettings, backtrace: bool, workload: Workload) -> Result<Report> {
    let source = if backtrace {
        FrameSource::Backtrace
    } else {
        FrameSource::Synthetic
    };
    let report = match workload {
        Workload::Chain { length } => simulate::chain(settings, source, length),
        Workload::FanOut { width } => simulate::fan_out(settings, source, width),
        Workload::Cycle => simulate::cycle(settings, source),
    };
    report.context("Workload failed")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;

    let level = cli.log_level.as_deref().unwrap_or(&settings.logging.level);
    tether_core::logging::init_subscriber(level);
    tracing::debug!(version = tether_core::constants::VERSION, "tether starting");

    match cli.command {
        Command::Settings => {
            let json = serde_json::to_string_pretty(&settings)
                .context("Failed to serialize settings")?;
            println!("{json}");
        }
        Command::Simulate {
            backtrace,
            workload,
        } => {
            let report = run_workload(&settings, backtrace, workload)?;
            if cli.json {
                let json =
                    serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
                println!("{json}");
            } else {
                print!("{report}");
            }
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
