//! CLI module for pipescope
//!
//! Provides commands over a recorded run:
//! - `steps`: Per-step records
//! - `critical-path`: Steps bounding the run duration
//! - `metrics`: Runtime metrics
//! - `invocations`: Individual runs of a repeated step
//! - `replay`: Node state at a point in time, or timed playback
//! - `summary`: One-screen overview

use clap::{Parser, Subcommand};
use pipescope_trace::{RunBundle, RunSource};

use crate::config::AppConfig;
use crate::source::FileRunSource;

pub mod inspect;
pub mod replay;

/// Pipeline run inspector
#[derive(Parser, Debug)]
#[command(name = "pipescope")]
#[command(about = "Inspect and replay pipeline runs")]
#[command(version)]
pub struct Cli {
    /// Directory holding `<run_id>.json` bundles (overrides config)
    #[arg(long, global = true)]
    pub runs_dir: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Per-step records
    Steps {
        /// Run id, or path to a bundle file
        run: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Steps on the critical path
    CriticalPath {
        /// Run id, or path to a bundle file
        run: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Runtime metrics from the finish payload or the event log
    Metrics {
        /// Run id, or path to a bundle file
        run: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Individual invocations of a step
    Invocations {
        /// Run id, or path to a bundle file
        run: String,
        /// Step name
        #[arg(long)]
        step: String,
    },
    /// Replay node state
    Replay {
        /// Run id, or path to a bundle file
        run: String,
        /// Elapsed milliseconds to seek to
        #[arg(long, conflicts_with = "play")]
        at: Option<u64>,
        /// Play the run back in real time
        #[arg(long)]
        play: bool,
        /// Playback speed multiplier (overrides config)
        #[arg(long)]
        speed: Option<f64>,
    },
    /// Overview of a run
    Summary {
        /// Run id, or path to a bundle file
        run: String,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    let runs_dir = cli.runs_dir.unwrap_or_else(|| config.source.runs_dir.clone());

    match cli.command {
        Some(Commands::Steps { run, json }) => {
            inspect::steps(&fetch(&runs_dir, &run).await?, json)
        }
        Some(Commands::CriticalPath { run, json }) => {
            inspect::critical_path(&fetch(&runs_dir, &run).await?, json)
        }
        Some(Commands::Metrics { run, json }) => {
            inspect::metrics(&fetch(&runs_dir, &run).await?, json)
        }
        Some(Commands::Invocations { run, step }) => {
            inspect::invocations(&fetch(&runs_dir, &run).await?, &step)
        }
        Some(Commands::Replay {
            run,
            at,
            play,
            speed,
        }) => {
            let bundle = fetch(&runs_dir, &run).await?;
            let speed = speed.unwrap_or(config.replay.speed);
            if play {
                replay::play(bundle, config.replay.tick_interval(), speed).await
            } else {
                replay::seek(bundle, at).await
            }
        }
        Some(Commands::Summary { run }) => inspect::summary(&fetch(&runs_dir, &run).await?),
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

async fn fetch(runs_dir: &str, run: &str) -> anyhow::Result<RunBundle> {
    use anyhow::Context;

    let (source, run_id) = FileRunSource::resolve(runs_dir, run);
    source
        .fetch_bundle(&run_id)
        .await
        .with_context(|| format!("Failed to load run '{run_id}' from {} source", source.name()))
}
