//! Message types for the registry actor.

use std::time::Duration;

use pi_core::{JobId, JobSnapshot, JobTicket};
use ractor::RpcReplyPort;

use crate::sink::SinkError;
use crate::worker::ReleaseOutcome;

/// Messages for the JobRegistry actor.
#[derive(Debug)]
pub enum RegistryMessage {
    /// Spawn a worker and track it as a new job.
    Start {
        reply: RpcReplyPort<Result<JobTicket, RegistryError>>,
    },

    /// Snapshot every tracked job.
    ListProgress { reply: RpcReplyPort<Vec<JobSnapshot>> },

    /// Ask a job's worker to terminate. Replies whether a signal was sent.
    Kill {
        job_id: JobId,
        reply: Option<RpcReplyPort<bool>>,
    },

    /// Evict jobs older than the timeout.
    Cleanup {
        reply: Option<RpcReplyPort<CleanupReport>>,
    },

    /// Stop the registry, killing any remaining workers.
    Shutdown,
}

/// What one cleanup pass did.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Jobs still tracked before the pass.
    pub scanned: usize,
    pub evicted: Vec<Eviction>,
}

impl CleanupReport {
    pub fn evicted_ids(&self) -> Vec<JobId> {
        self.evicted.iter().map(|e| e.job_id).collect()
    }
}

/// One job removed by cleanup.
#[derive(Debug)]
pub struct Eviction {
    pub job_id: JobId,
    pub pid: u32,
    pub age: Duration,
    /// Whether the worker was still running when the pass reached it.
    pub was_alive: bool,
    pub outcome: ReleaseOutcome,
}

/// Error type for registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Registry is at capacity ({max} jobs)")]
    AtCapacity { max: usize },

    #[error("Registry unavailable: {0}")]
    Unavailable(String),

    #[error("Timeout")]
    Timeout,

    #[error("Result sink error: {0}")]
    Sink(#[from] SinkError),
}
