//! icens - rate-adaptive pub/sub simulation
//!
//! Runs the built-in scenarios or a JSON scenario file and prints the
//! negotiated frequencies and a transmission report.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use icens_logging::IcensSubscriberBuilder;

use icens_simulation::{ScenarioConfig, Simulation, TransmissionReport, scenarios};

#[derive(Parser)]
#[command(
    name = "icens",
    about = "Rate-adaptive publish/subscribe simulation",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines instead of human-readable output
    #[arg(long, global = true)]
    json_logs: bool,

    /// Write the transmission report as JSON to this file
    #[arg(short, long, global = true)]
    report: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Three subscribers joining at 1s, 5s and 8s
    Adaptive,

    /// Three soft subscribers on a multicast tree
    ChristmasTree,

    /// Two subscribers joining at (almost) the same instant
    Race {
        /// Start both joins at exactly 12s instead of 12s and 12.001s
        #[arg(short, long)]
        simultaneous: bool,
    },

    /// Run a scenario file
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Show the topology of a scenario file
    Topology {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Print a built-in scenario as JSON
    DumpConfig {
        /// adaptive, christmas-tree, race or race-simultaneous
        preset: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing
    let _guard = IcensSubscriberBuilder::new()
        .with_level(if cli.verbose { "debug" } else { "info" })
        .with_json_console(cli.json_logs)
        .init();

    let sim = match cli.command {
        Commands::Adaptive => scenarios::run_adaptive_scenario()?,
        Commands::ChristmasTree => scenarios::run_christmas_tree_scenario()?,
        Commands::Race { simultaneous } => scenarios::run_race_scenario(simultaneous)?,
        Commands::Run { config } => {
            let config = load(&config)?;
            scenarios::run_config(&config, &[])?
        }
        Commands::Topology { config } => {
            let plan = load(&config)?.validate()?;
            println!("{}", plan.topology.visualize());
            println!(
                "Strategy: {} for {}",
                plan.strategy.strategy, plan.strategy.prefix
            );
            return Ok(());
        }
        Commands::DumpConfig { preset } => {
            println!("{}", ScenarioConfig::preset(&preset)?.to_json_pretty()?);
            return Ok(());
        }
    };

    finish(&sim, cli.report.as_deref())
}

fn load(path: &Path) -> anyhow::Result<ScenarioConfig> {
    ScenarioConfig::from_json_file(path)
        .with_context(|| format!("loading scenario {}", path.display()))
}

fn finish(sim: &Simulation, report: Option<&Path>) -> anyhow::Result<()> {
    if let Some(path) = report {
        TransmissionReport::from_simulation(sim)
            .write_json(path)
            .with_context(|| format!("writing report {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    if !sim.errors().is_empty() {
        anyhow::bail!(
            "{} error(s) during simulation, first: {}",
            sim.errors().len(),
            sim.errors()[0]
        );
    }
    Ok(())
}
