//! Job domain types for tracked estimation runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a job, a random 128-bit token.
///
/// Rendered as 32 lowercase hex digits without separators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Create a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a job ID from a string (hyphenated or simple form).
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Where a job's worker is in its lifecycle, as observed through its reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// Worker is (as far as we know) still iterating.
    #[default]
    Running,
    /// Worker published a numeric estimate.
    Completed,
    /// Worker finished but observed no crossings, so no estimate exists.
    Undefined,
    /// Worker output ended without a final report (killed or crashed).
    Stopped,
}

impl JobPhase {
    /// Check if the worker has left the running phase.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobPhase::Running)
    }

    /// Get a simple phase string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Running => "running",
            JobPhase::Completed => "completed",
            JobPhase::Undefined => "undefined",
            JobPhase::Stopped => "stopped",
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            JobPhase::Running => 0,
            JobPhase::Completed => 1,
            JobPhase::Undefined => 2,
            JobPhase::Stopped => 3,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => JobPhase::Completed,
            2 => JobPhase::Undefined,
            3 => JobPhase::Stopped,
            _ => JobPhase::Running,
        }
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned to the caller of `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTicket {
    pub id: JobId,
    /// Native OS process id of the worker.
    pub pid: u32,
}

/// Point-in-time view of one tracked job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub pid: u32,
    /// `completed_units / total_units * 100`, clamped to `[0, 100]`.
    pub percent_complete: f64,
    /// Published estimate, `0.0` until the worker completes.
    pub result: f64,
    pub phase: JobPhase,
    pub total_units: u64,
    pub completed_units: u64,
    pub started_at: DateTime<Utc>,
}

/// Percentage of `completed` over `total`, clamped to `[0, 100]`.
///
/// A job with nothing to do counts as fully complete.
pub fn percent_complete(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let pct = completed as f64 / total as f64 * 100.0;
    pct.clamp(0.0, 100.0)
}
