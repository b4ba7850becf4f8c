//! Configuration for the job manager.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::estimator::DEFAULT_ITERATIONS;

/// How to launch a worker process.
///
/// The registry appends `--iterations <n>` (and `--report-every <k>` when
/// configured) to `args`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Run the worker subcommand of the currently running executable.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?).with_arg("worker"))
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl Default for WorkerCommand {
    fn default() -> Self {
        Self::new("pi-jobs").with_arg("worker")
    }
}

/// Job manager configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    /// Drops per job.
    pub iterations: u64,
    /// Forwarded to workers as `--report-every`; workers pick their own cadence when unset.
    pub report_every: Option<u64>,
    /// Age after which the sweeper evicts a job, finished or not.
    pub job_timeout: Duration,
    /// Pause between sweeper passes.
    pub sweep_interval: Duration,
    /// How long cleanup waits for a killed worker to be reaped.
    pub reap_grace: Duration,
    /// Timeout for calls into the registry actor.
    pub call_timeout: Duration,
    /// Admission cap on tracked jobs. `None` keeps spawning unbounded.
    pub max_jobs: Option<usize>,
    pub worker: WorkerCommand,
    /// Directory for per-job result records. No records are written when unset.
    pub results_dir: Option<PathBuf>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            report_every: None,
            job_timeout: Duration::from_secs(120),
            sweep_interval: Duration::from_secs(10),
            reap_grace: Duration::from_millis(500),
            call_timeout: Duration::from_secs(10),
            max_jobs: None,
            worker: WorkerCommand::default(),
            results_dir: None,
        }
    }
}

impl ManagerConfig {
    /// Defaults overlaid with `PI_JOBS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Overlay values found by `lookup` on top of this config.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(n) = parse_var::<u64>(&lookup, "PI_JOBS_ITERATIONS")? {
            self.iterations = n;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "PI_JOBS_TIMEOUT_SECS")? {
            self.job_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "PI_JOBS_SWEEP_SECS")? {
            self.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "PI_JOBS_REAP_GRACE_MS")? {
            self.reap_grace = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "PI_JOBS_CALL_TIMEOUT_SECS")? {
            self.call_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = parse_var::<usize>(&lookup, "PI_JOBS_MAX_JOBS")? {
            self.max_jobs = Some(max);
        }
        if let Some(program) = lookup("PI_JOBS_WORKER") {
            self.worker.program = PathBuf::from(program);
        }
        if let Some(dir) = lookup("PI_JOBS_RESULTS_DIR") {
            self.results_dir = Some(PathBuf::from(dir));
        }
        Ok(self)
    }

    /// Set the number of drops per job.
    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_report_every(mut self, every: u64) -> Self {
        self.report_every = Some(every);
        self
    }

    /// Set the eviction age.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Set the sweeper interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_reap_grace(mut self, grace: Duration) -> Self {
        self.reap_grace = grace;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Cap the number of tracked jobs.
    pub fn with_max_jobs(mut self, max: usize) -> Self {
        self.max_jobs = Some(max);
        self
    }

    /// Set the worker launch command.
    pub fn with_worker(mut self, worker: WorkerCommand) -> Self {
        self.worker = worker;
        self
    }

    /// Record finished results as JSON files under `dir`.
    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = Some(dir.into());
        self
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<T>() {
        Ok(value) => Ok(Some(value)),
        Err(_) => Err(ConfigError::Invalid { key, value: raw }),
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
