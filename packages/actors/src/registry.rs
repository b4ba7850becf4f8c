//! Registry actor owning every tracked job.
//!
//! The actor's mailbox is the registry's only lock: `Start`, `Kill` and
//! `Cleanup` each run to completion before the next message is handled, and
//! `ListProgress` always sees a job table that no mutation is halfway through.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use pi_core::{
    JobEvent, JobId, JobSnapshot, JobTicket, ManagerConfig, ProgressCell, percent_complete,
};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast;

use crate::messages::{CleanupReport, Eviction, RegistryError, RegistryMessage};
use crate::sink::ResultSink;
use crate::worker::{ReleaseOutcome, ReportContext, WorkerProcess};

/// One job as the registry sees it.
struct TrackedJob {
    id: JobId,
    process: WorkerProcess,
    progress: Arc<ProgressCell>,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl TrackedJob {
    fn snapshot(&self) -> JobSnapshot {
        // Phase first: once it is terminal, the counters read after it are final.
        let phase = self.progress.phase();
        let completed = self.progress.completed();
        let total = self.progress.total();
        JobSnapshot {
            id: self.id,
            pid: self.process.pid(),
            percent_complete: percent_complete(completed, total),
            result: self.progress.result(),
            phase,
            total_units: total,
            completed_units: completed,
            started_at: self.started_at,
        }
    }
}

/// Registry actor arguments.
pub struct RegistryArgs {
    pub config: ManagerConfig,
    pub event_tx: broadcast::Sender<JobEvent>,
    pub sink: Option<Arc<dyn ResultSink>>,
}

/// State for the registry actor.
pub struct RegistryState {
    config: ManagerConfig,
    /// Tracked jobs in start order.
    jobs: Vec<TrackedJob>,
    event_tx: broadcast::Sender<JobEvent>,
    sink: Option<Arc<dyn ResultSink>>,
}

impl RegistryState {
    pub fn new(args: RegistryArgs) -> Self {
        Self {
            config: args.config,
            jobs: Vec::new(),
            event_tx: args.event_tx,
            sink: args.sink,
        }
    }

    fn broadcast(&self, event: JobEvent) {
        let _ = self.event_tx.send(event);
    }

    fn start_job(&mut self) -> Result<JobTicket, RegistryError> {
        if let Some(max) = self.config.max_jobs
            && self.jobs.len() >= max
        {
            return Err(RegistryError::AtCapacity { max });
        }

        let id = JobId::new();
        let total = self.config.iterations;
        let progress = Arc::new(ProgressCell::new(total));

        let mut ctx = ReportContext::new(id, progress.clone()).with_event_tx(self.event_tx.clone());
        if let Some(ref sink) = self.sink {
            ctx = ctx.with_sink(sink.clone());
        }

        let process =
            WorkerProcess::spawn(&self.config.worker, total, self.config.report_every, ctx)?;
        let pid = process.pid();
        let started_at = Utc::now();

        self.jobs.push(TrackedJob {
            id,
            process,
            progress,
            started_at,
            started: Instant::now(),
        });

        tracing::info!("Started job {} as pid {} ({} drops)", id, pid, total);
        self.broadcast(JobEvent::JobStarted {
            job_id: id,
            pid,
            total_units: total,
            timestamp: started_at,
        });

        Ok(JobTicket { id, pid })
    }

    fn kill_job(&mut self, job_id: JobId) -> bool {
        let Some(job) = self.jobs.iter_mut().find(|j| j.id == job_id) else {
            tracing::debug!("Kill requested for unknown job {}", job_id);
            return false;
        };

        if !job.process.is_alive() {
            tracing::debug!("Job {} already exited, nothing to kill", job_id);
            return false;
        }

        let pid = job.process.pid();
        match job.process.terminate() {
            Ok(()) => {
                tracing::info!("Requested termination of job {} (pid {})", job_id, pid);
                let _ = self.event_tx.send(JobEvent::JobKillRequested {
                    job_id,
                    pid,
                    timestamp: Utc::now(),
                });
                true
            }
            Err(e) => {
                tracing::warn!("Failed to terminate job {} (pid {}): {}", job_id, pid, e);
                false
            }
        }
    }

    async fn cleanup(&mut self) -> CleanupReport {
        let scanned = self.jobs.len();
        if scanned == 0 {
            tracing::debug!("No tracked jobs to clean up");
            return CleanupReport::default();
        }
        tracing::debug!("Checking {} tracked jobs", scanned);

        let timeout = self.config.job_timeout;
        let (expired, kept): (Vec<TrackedJob>, Vec<TrackedJob>) = std::mem::take(&mut self.jobs)
            .into_iter()
            .partition(|j| j.started.elapsed() > timeout);
        self.jobs = kept;

        let mut evicted = Vec::with_capacity(expired.len());
        for mut job in expired {
            let age = job.started.elapsed();
            let pid = job.process.pid();
            let was_alive = job.process.is_alive();
            let outcome = job.process.force_release(self.config.reap_grace).await;

            match &outcome {
                ReleaseOutcome::Exited(_) if was_alive => {
                    tracing::info!("Killed and released job {} (pid {})", job.id, pid)
                }
                ReleaseOutcome::Exited(_) => tracing::info!("Released job {} (pid {})", job.id, pid),
                ReleaseOutcome::StillRunning => tracing::warn!(
                    "Job {} (pid {}) was still exiting when released; dropping it anyway",
                    job.id,
                    pid
                ),
                ReleaseOutcome::Failed(e) => {
                    tracing::warn!("Failed to release job {} (pid {}): {}", job.id, pid, e)
                }
            }

            self.broadcast(JobEvent::JobEvicted {
                job_id: job.id,
                pid,
                age_ms: duration_ms(age),
                timestamp: Utc::now(),
            });

            evicted.push(Eviction {
                job_id: job.id,
                pid,
                age,
                was_alive,
                outcome,
            });
        }

        if !evicted.is_empty() {
            tracing::info!(
                "Cleanup evicted {} of {} jobs, {} remain",
                evicted.len(),
                scanned,
                self.jobs.len()
            );
        }

        CleanupReport { scanned, evicted }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Registry actor that owns all jobs.
pub struct JobRegistry;

impl Actor for JobRegistry {
    type Msg = RegistryMessage;
    type State = RegistryState;
    type Arguments = RegistryArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "Starting job registry (timeout {:?}, {} drops per job)",
            args.config.job_timeout,
            args.config.iterations
        );
        Ok(RegistryState::new(args))
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        // Never return an error from here: it would stop the actor and strand
        // every tracked worker.
        match message {
            RegistryMessage::Start { reply } => {
                let result = state.start_job();
                if let Err(ref e) = result {
                    tracing::warn!("Failed to start job: {}", e);
                }
                let _ = reply.send(result);
            }

            RegistryMessage::ListProgress { reply } => {
                let snapshots = state.jobs.iter().map(TrackedJob::snapshot).collect();
                let _ = reply.send(snapshots);
            }

            RegistryMessage::Kill { job_id, reply } => {
                let signalled = state.kill_job(job_id);
                if let Some(reply) = reply {
                    let _ = reply.send(signalled);
                }
            }

            RegistryMessage::Cleanup { reply } => {
                let report = state.cleanup().await;
                if let Some(reply) = reply {
                    let _ = reply.send(report);
                }
            }

            RegistryMessage::Shutdown => {
                tracing::info!("Shutting down job registry");
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if !state.jobs.is_empty() {
            tracing::info!("Registry stopped with {} jobs; killing workers", state.jobs.len());
        }
        for job in state.jobs.iter_mut() {
            job.process.force_release(state.config.reap_grace).await;
        }
        state.jobs.clear();
        Ok(())
    }
}

/// Spawn the registry actor.
pub async fn start_registry(
    args: RegistryArgs,
) -> Result<(ActorRef<RegistryMessage>, tokio::task::JoinHandle<()>), ractor::SpawnErr> {
    let (actor, handle) = Actor::spawn(None, JobRegistry, args).await?;

    Ok((actor, handle))
}
