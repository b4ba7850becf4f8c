//! Core domain types for the pi estimation job system.
//!
//! This crate contains shared types used across all packages:
//! - Job identifiers, phases and snapshots
//! - The per-job progress cell
//! - The Buffon's needle estimator and the worker report format
//! - Events and manager configuration

mod config;
mod estimator;
mod events;
mod job;
mod progress;
mod report;

pub use config::{ConfigError, ManagerConfig, WorkerCommand};
pub use estimator::{DEFAULT_ITERATIONS, Estimate, drop_needle, estimate_pi};
pub use events::JobEvent;
pub use job::{JobId, JobPhase, JobSnapshot, JobTicket, percent_complete};
pub use progress::ProgressCell;
pub use report::{ReportCadence, ReportError, WorkerReport};
