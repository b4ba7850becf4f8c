//! Event types for real-time updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::JobId;

/// Events emitted by the job registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// A worker process was spawned for a new job.
    JobStarted {
        job_id: JobId,
        pid: u32,
        total_units: u64,
        timestamp: DateTime<Utc>,
    },
    /// Graceful termination was requested for a live job.
    JobKillRequested {
        job_id: JobId,
        pid: u32,
        timestamp: DateTime<Utc>,
    },
    /// A worker published its final report.
    JobFinished {
        job_id: JobId,
        /// `None` when the estimate is undefined.
        estimate: Option<f64>,
        timestamp: DateTime<Utc>,
    },
    /// A worker's output ended without a final report.
    JobStopped {
        job_id: JobId,
        timestamp: DateTime<Utc>,
    },
    /// The sweeper removed a job from the registry.
    JobEvicted {
        job_id: JobId,
        pid: u32,
        age_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            JobEvent::JobStarted { timestamp, .. } => *timestamp,
            JobEvent::JobKillRequested { timestamp, .. } => *timestamp,
            JobEvent::JobFinished { timestamp, .. } => *timestamp,
            JobEvent::JobStopped { timestamp, .. } => *timestamp,
            JobEvent::JobEvicted { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job ID this event is about.
    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::JobStarted { job_id, .. } => *job_id,
            JobEvent::JobKillRequested { job_id, .. } => *job_id,
            JobEvent::JobFinished { job_id, .. } => *job_id,
            JobEvent::JobStopped { job_id, .. } => *job_id,
            JobEvent::JobEvicted { job_id, .. } => *job_id,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            JobEvent::JobStarted {
                job_id,
                pid,
                total_units,
                ..
            } => format!("Job {} started as pid {} ({} units)", job_id, pid, total_units),
            JobEvent::JobKillRequested { job_id, pid, .. } => {
                format!("Job {} (pid {}) asked to terminate", job_id, pid)
            }
            JobEvent::JobFinished {
                job_id,
                estimate: Some(value),
                ..
            } => format!("Job {} finished: {}", job_id, value),
            JobEvent::JobFinished { job_id, .. } => {
                format!("Job {} finished without crossings", job_id)
            }
            JobEvent::JobStopped { job_id, .. } => format!("Job {} stopped early", job_id),
            JobEvent::JobEvicted { job_id, age_ms, .. } => {
                format!("Job {} evicted after {}ms", job_id, age_ms)
            }
        }
    }
}
