use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pi-jobs")]
#[command(about = "Launch, watch and reclaim Buffon's needle estimation jobs.")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one estimation, writing JSON progress reports to stdout.
    Worker(WorkerArgs),
    /// Start jobs through a job manager and print their progress until they finish.
    Demo(DemoArgs),
}

#[derive(Debug, Args)]
pub(crate) struct WorkerArgs {
    /// Number of needle drops.
    #[arg(long, default_value_t = pi_core::DEFAULT_ITERATIONS)]
    pub(crate) iterations: u64,

    /// Report progress every N drops (default: a thousandth of the run)
    #[arg(long)]
    pub(crate) report_every: Option<u64>,
}

#[derive(Debug, Args)]
pub(crate) struct DemoArgs {
    /// Number of jobs to start.
    #[arg(long, default_value_t = 2)]
    pub(crate) jobs: usize,

    /// Drops per job (default: PI_JOBS_ITERATIONS or 10,000,000)
    #[arg(long)]
    pub(crate) iterations: Option<u64>,

    /// Milliseconds between progress polls.
    #[arg(long, default_value_t = 500)]
    pub(crate) poll_ms: u64,

    /// Kill the first job right after starting it.
    #[arg(long)]
    pub(crate) kill_first: bool,

    /// Write finished results as JSON files into this directory.
    #[arg(long)]
    pub(crate) results_dir: Option<PathBuf>,
}
