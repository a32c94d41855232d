//! Headless driver for the Quartz automation engine.

use std::{
    fs,
    path::{Path, PathBuf},
    process,
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use quartz_core::{EngineConfig, config::DEFAULT_CONFIG};
use quartz_headless::{BenchOptions, Scenario, logging, run_bench, run_scenario};

#[derive(Parser)]
#[command(
    name = "quartz-headless",
    version,
    about = "Run automation scenarios and benchmarks without a game server"
)]
struct Cli {
    /// Engine configuration file. Defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "config/quartz_config.json5")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run scenario files and check their assertions.
    Run {
        /// Scenario files.
        #[arg(required = true)]
        scenarios: Vec<PathBuf>,
        /// Print full outcomes as JSON on stdout.
        #[arg(long)]
        json: bool,
    },
    /// Measure tick throughput on a random layout.
    Bench {
        /// Sites to scatter.
        #[arg(long, default_value_t = 10_000)]
        sites: usize,
        /// Ticks to run.
        #[arg(long, default_value_t = 1_200)]
        ticks: u64,
        /// Layout seed.
        #[arg(long, default_value_t = 12_345)]
        seed: u64,
    },
    /// Write the default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init("info");

    match cli.command {
        Command::Run { scenarios, json } => {
            let config = load_config(&cli.config)?;
            cmd_run(&scenarios, json, &config)
        }
        Command::Bench { sites, ticks, seed } => {
            let config = load_config(&cli.config)?;
            cmd_bench(BenchOptions { sites, ticks, seed }, config)
        }
        Command::InitConfig { force } => cmd_init_config(&cli.config, force),
    }
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    let config = EngineConfig::load_or_default(path)
        .with_context(|| format!("load config {}", path.display()))?;
    log::debug!("Using config {config:?}");
    Ok(config)
}

fn cmd_run(paths: &[PathBuf], json: bool, config: &EngineConfig) -> Result<()> {
    let mut failed = 0;
    let mut outcomes = Vec::with_capacity(paths.len());
    for path in paths {
        let scenario =
            Scenario::load(path).with_context(|| format!("load scenario {}", path.display()))?;
        let outcome = run_scenario(&scenario, config)
            .with_context(|| format!("run scenario {}", scenario.name))?;

        if outcome.passed() {
            log::info!("{}: passed ({} ticks)", outcome.name, outcome.reports.len());
        } else {
            failed += 1;
            for failure in &outcome.failures {
                log::error!("{}: tick {}: {}", outcome.name, failure.tick, failure.message);
            }
        }
        outcomes.push(outcome);
    }

    if json {
        let payload = serde_json::to_string_pretty(&outcomes).context("serialize outcomes")?;
        println!("{payload}");
    }
    if failed > 0 {
        bail!("{failed} of {} scenarios failed", paths.len());
    }
    Ok(())
}

fn cmd_bench(options: BenchOptions, config: EngineConfig) -> Result<()> {
    let summary = run_bench(&options, config).context("run benchmark")?;
    log::info!(
        "{} ticks over {} sites: avg {:?}, max {:?}, {:.1}% of tick budget",
        summary.ticks,
        summary.sites,
        summary.average_tick,
        summary.max_tick,
        summary.budget_used * 100.0
    );
    let payload = serde_json::to_string_pretty(&summary).context("serialize summary")?;
    println!("{payload}");
    Ok(())
}

fn cmd_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG).with_context(|| format!("write {}", path.display()))?;
    log::info!("Wrote default config to {}", path.display());
    Ok(())
}
