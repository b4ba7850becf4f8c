//! Line-delimited JSON reports a worker writes to its stdout.

use serde::{Deserialize, Serialize};

use crate::estimator::Estimate;

/// One report line from a worker process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerReport {
    /// `completed` drops are done.
    Progress { completed: u64 },
    /// The run is over. `None` when no crossing occurred.
    Finished { estimate: Option<f64> },
}

impl WorkerReport {
    pub fn finished(estimate: Estimate) -> Self {
        WorkerReport::Finished {
            estimate: estimate.value(),
        }
    }

    /// Encode as a single line, without the trailing newline.
    pub fn to_line(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode one line. Surrounding whitespace is ignored.
    pub fn parse_line(line: &str) -> Result<Self, ReportError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ReportError::Empty);
        }
        Ok(serde_json::from_str(line)?)
    }
}

/// Throttles per-iteration progress to one report every `every` units.
///
/// The final unit is always reported.
#[derive(Debug, Clone, Copy)]
pub struct ReportCadence {
    every: u64,
    total: u64,
}

impl ReportCadence {
    pub fn new(total: u64, every: u64) -> Self {
        Self {
            every: every.max(1),
            total,
        }
    }

    /// One report per thousandth of the run.
    pub fn per_mille(total: u64) -> Self {
        Self::new(total, total / 1000)
    }

    pub fn every(&self) -> u64 {
        self.every
    }

    pub fn should_report(&self, completed: u64) -> bool {
        completed == self.total || completed % self.every == 0
    }
}

/// Report decoding errors.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("empty report line")]
    Empty,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
