//! Worker processes and the tasks that read their reports.

use std::fmt;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pi_core::{Estimate, JobEvent, JobId, ProgressCell, ReportError, WorkerCommand, WorkerReport};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::sink::{ResultRecord, ResultSink};

/// Everything a report reader needs to publish a job's progress.
#[derive(Clone)]
pub struct ReportContext {
    pub job_id: JobId,
    pub progress: Arc<ProgressCell>,
    pub event_tx: Option<broadcast::Sender<JobEvent>>,
    pub sink: Option<Arc<dyn ResultSink>>,
}

impl ReportContext {
    pub fn new(job_id: JobId, progress: Arc<ProgressCell>) -> Self {
        Self {
            job_id,
            progress,
            event_tx: None,
            sink: None,
        }
    }

    /// Set the event broadcaster.
    pub fn with_event_tx(mut self, tx: broadcast::Sender<JobEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Set the sink finished results are recorded to.
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn broadcast(&self, event: JobEvent) {
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// Apply one decoded report.
    pub async fn apply(&self, report: WorkerReport) {
        match report {
            WorkerReport::Progress { completed } => self.progress.record_progress(completed),
            WorkerReport::Finished { estimate } => self.finish(Estimate::from(estimate)).await,
        }
    }

    async fn finish(&self, estimate: Estimate) {
        if !self.progress.finish(estimate) {
            tracing::debug!("Job {}: ignoring late final report", self.job_id);
            return;
        }

        match estimate {
            Estimate::Value(value) => tracing::info!("Job {} finished: {}", self.job_id, value),
            Estimate::Undefined => {
                tracing::info!("Job {} finished without crossings", self.job_id)
            }
        }

        self.broadcast(JobEvent::JobFinished {
            job_id: self.job_id,
            estimate: estimate.value(),
            timestamp: Utc::now(),
        });

        if let Some(ref sink) = self.sink {
            let record = ResultRecord::new(self.job_id, estimate, self.progress.completed());
            if let Err(e) = sink.record(record).await {
                tracing::warn!("Failed to record result of job {}: {}", self.job_id, e);
            }
        }
    }

    fn stopped(&self) {
        if self.progress.mark_stopped() {
            tracing::info!(
                "Job {} stopped at {}/{} without a result",
                self.job_id,
                self.progress.completed(),
                self.progress.total()
            );
            self.broadcast(JobEvent::JobStopped {
                job_id: self.job_id,
                timestamp: Utc::now(),
            });
        }
    }
}

/// Read reports from a worker's stdout until it closes.
async fn read_reports(stdout: ChildStdout, ctx: ReportContext) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match WorkerReport::parse_line(&line) {
                Ok(report) => ctx.apply(report).await,
                Err(ReportError::Empty) => {}
                Err(e) => {
                    tracing::debug!("Job {}: skipping worker output {:?}: {}", ctx.job_id, line, e)
                }
            },
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Job {}: failed to read worker output: {}", ctx.job_id, e);
                break;
            }
        }
    }
    ctx.stopped();
}

/// Result of releasing a worker's OS resources.
#[derive(Debug)]
pub enum ReleaseOutcome {
    /// The process has exited and was reaped.
    Exited(ExitStatus),
    /// The process had not exited within the grace period.
    StillRunning,
    /// Waiting on the process failed.
    Failed(io::Error),
}

impl ReleaseOutcome {
    pub fn is_exited(&self) -> bool {
        matches!(self, ReleaseOutcome::Exited(_))
    }
}

impl fmt::Display for ReleaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseOutcome::Exited(status) => write!(f, "exited ({})", status),
            ReleaseOutcome::StillRunning => write!(f, "still running"),
            ReleaseOutcome::Failed(e) => write!(f, "release failed: {}", e),
        }
    }
}

/// An owned worker process.
///
/// The child is spawned with kill-on-drop, so dropping the handle always
/// delivers SIGKILL to a worker that is still alive.
pub struct WorkerProcess {
    child: Child,
    pid: u32,
    reader: JoinHandle<()>,
}

impl WorkerProcess {
    /// Spawn `command` with `--iterations <iterations>` and start reading its reports.
    pub fn spawn(
        command: &WorkerCommand,
        iterations: u64,
        report_every: Option<u64>,
        ctx: ReportContext,
    ) -> io::Result<Self> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .arg("--iterations")
            .arg(iterations.to_string());
        if let Some(every) = report_every {
            cmd.arg("--report-every").arg(every.to_string());
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| io::Error::other("worker exited before its pid was read"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("worker stdout was not captured"))?;

        let reader = tokio::spawn(read_reports(stdout, ctx));

        Ok(Self { child, pid, reader })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Check whether the process has not exited yet.
    pub fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(_)) => false,
            Err(e) => {
                tracing::warn!("Failed to poll worker {}: {}", self.pid, e);
                false
            }
        }
    }

    /// Request graceful termination (SIGTERM where available).
    pub fn terminate(&mut self) -> io::Result<()> {
        #[cfg(unix)]
        {
            let pid = libc::pid_t::try_from(self.pid).map_err(io::Error::other)?;
            // The child has not been reaped (callers check `is_alive`), so the
            // pid still names our process.
            let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
            if rc != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        #[cfg(not(unix))]
        {
            self.child.start_kill()
        }
    }

    /// Kill the process if it is alive, then wait up to `grace` to reap it.
    pub async fn force_release(&mut self, grace: Duration) -> ReleaseOutcome {
        if self.is_alive()
            && let Err(e) = self.child.start_kill()
        {
            return ReleaseOutcome::Failed(e);
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => ReleaseOutcome::Exited(status),
            Ok(Err(e)) => ReleaseOutcome::Failed(e),
            Err(_) => ReleaseOutcome::StillRunning,
        }
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
