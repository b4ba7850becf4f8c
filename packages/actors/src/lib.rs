//! Actor system for pi estimation jobs.
//!
//! This crate provides the Ractor-based registry that launches worker
//! processes, tracks their progress, and reclaims them.
//!
//! # Architecture
//!
//! - `JobRegistry` - Actor owning every tracked job and its worker process
//! - `Sweeper` - Background task that asks the registry to evict stale jobs
//! - `JobManager` - Cloneable handle wrapping both, used by callers
//!
//! # Usage
//!
//! ```ignore
//! use actors::JobManager;
//! use pi_core::ManagerConfig;
//!
//! let manager = JobManager::start(ManagerConfig::from_env()?).await?;
//! let ticket = manager.start_job().await?;
//! for job in manager.list_progress().await? {
//!     println!("{} {:.1}%", job.id, job.percent_complete);
//! }
//! manager.kill(&ticket.id.to_string()).await?;
//! ```

mod global;
mod manager;
mod messages;
mod persistence;
mod registry;
mod sink;
mod sweeper;
mod worker;

pub use global::{global_manager, try_global_manager};
pub use manager::JobManager;
pub use messages::{CleanupReport, Eviction, RegistryError, RegistryMessage};
pub use persistence::JsonFileSink;
pub use registry::{JobRegistry, RegistryArgs, start_registry};
pub use sink::{FnSink, ResultRecord, ResultSink, SinkError, SinkFuture, SinkResult};
pub use sweeper::Sweeper;
pub use worker::{ReleaseOutcome, ReportContext, WorkerProcess};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort};
