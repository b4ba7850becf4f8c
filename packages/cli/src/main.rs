//! pi-jobs: worker process and demo driver for the estimation job registry.
//!
//! Logging goes to stderr because a worker's stdout carries its reports. Set
//! `RUST_LOG` (e.g. `RUST_LOG=actors=debug`) to change the level.

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match cli.command {
        Command::Worker(args) => commands::worker::run(args),
        Command::Demo(args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::demo::run(args))
        }
    }
}
