//! Pipescope - Pipeline run inspector
//!
//! CLI entry point: per-step records, critical path, metrics and replay for
//! recorded pipeline runs.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;
mod loader;
mod source;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let config = loader::load_config()?;

    let json = config.logging.json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.clone().into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    debug!("Starting pipescope v{}", env!("CARGO_PKG_VERSION"));

    let cli = cli::Cli::parse();
    cli::run(cli, config).await
}
