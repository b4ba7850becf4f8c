//! Per-job progress state shared between a report reader and observers.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use crate::estimator::Estimate;
use crate::job::{JobPhase, percent_complete};

/// Progress and result of one job.
///
/// Written only by the job's report reader, read by anyone. Each field is
/// individually atomic; a reader may observe `completed` from one report and
/// `result` from the next, which is fine since progress is advisory.
#[derive(Debug)]
pub struct ProgressCell {
    total: u64,
    completed: AtomicU64,
    result: AtomicU64,
    phase: AtomicU8,
}

impl ProgressCell {
    /// Create a cell for a job with `total` units of work.
    pub fn new(total: u64) -> Self {
        Self {
            total,
            completed: AtomicU64::new(0),
            result: AtomicU64::new(0.0_f64.to_bits()),
            phase: AtomicU8::new(JobPhase::Running.to_u8()),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    pub fn result(&self) -> f64 {
        f64::from_bits(self.result.load(Ordering::Acquire))
    }

    pub fn phase(&self) -> JobPhase {
        JobPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn percent_complete(&self) -> f64 {
        percent_complete(self.completed(), self.total)
    }

    /// Record that `completed` units are done. Never moves backwards.
    pub fn record_progress(&self, completed: u64) {
        self.completed.fetch_max(completed, Ordering::AcqRel);
    }

    /// Publish the final estimate.
    ///
    /// Returns `false` if the job already left the running phase, in which
    /// case nothing is written.
    pub fn finish(&self, estimate: Estimate) -> bool {
        let phase = match estimate {
            Estimate::Value(value) => {
                if !self.leave_running(JobPhase::Completed) {
                    return false;
                }
                self.result.store(value.to_bits(), Ordering::Release);
                return true;
            }
            Estimate::Undefined => JobPhase::Undefined,
        };
        self.leave_running(phase)
    }

    /// Mark the job as stopped without a result.
    ///
    /// Returns `false` if it had already finished.
    pub fn mark_stopped(&self) -> bool {
        self.leave_running(JobPhase::Stopped)
    }

    fn leave_running(&self, next: JobPhase) -> bool {
        self.phase
            .compare_exchange(
                JobPhase::Running.to_u8(),
                next.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}
