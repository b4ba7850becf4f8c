//! Result sink trait for recording finished estimates.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use pi_core::{Estimate, JobId};
use serde::{Deserialize, Serialize};

/// A finished job's result, as handed to a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub job_id: JobId,
    /// `None` when no crossing occurred.
    pub estimate: Option<f64>,
    pub completed_units: u64,
    pub recorded_at: DateTime<Utc>,
}

impl ResultRecord {
    pub fn new(job_id: JobId, estimate: Estimate, completed_units: u64) -> Self {
        Self {
            job_id,
            estimate: estimate.value(),
            completed_units,
            recorded_at: Utc::now(),
        }
    }
}

/// Result type for sinks.
pub type SinkResult = Result<(), SinkError>;

/// Future type for async sinks.
pub type SinkFuture = Pin<Box<dyn Future<Output = SinkResult> + Send>>;

/// Trait for result sinks.
///
/// Called once per job that publishes a final report. The registry does not
/// depend on a sink succeeding; failures are logged and dropped.
pub trait ResultSink: Send + Sync + 'static {
    fn record(&self, record: ResultRecord) -> SinkFuture;
}

/// A simple function-based sink.
pub struct FnSink<F>
where
    F: Fn(ResultRecord) -> SinkFuture + Send + Sync + 'static,
{
    sink: F,
}

impl<F> FnSink<F>
where
    F: Fn(ResultRecord) -> SinkFuture + Send + Sync + 'static,
{
    pub fn new(sink: F) -> Self {
        Self { sink }
    }
}

impl<F> ResultSink for FnSink<F>
where
    F: Fn(ResultRecord) -> SinkFuture + Send + Sync + 'static,
{
    fn record(&self, record: ResultRecord) -> SinkFuture {
        (self.sink)(record)
    }
}

/// Sink errors.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Rejected(String),
}
