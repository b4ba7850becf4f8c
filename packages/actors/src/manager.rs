//! Handle to a running registry and its sweeper.

use std::sync::Arc;
use std::time::Duration;

use pi_core::{JobEvent, JobId, JobSnapshot, JobTicket, ManagerConfig};
use ractor::rpc::CallResult;
use ractor::{ActorRef, RpcReplyPort};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

use crate::messages::{CleanupReport, RegistryError, RegistryMessage};
use crate::persistence::JsonFileSink;
use crate::registry::{RegistryArgs, start_registry};
use crate::sink::ResultSink;
use crate::sweeper::Sweeper;

struct ManagerInner {
    registry: ActorRef<RegistryMessage>,
    registry_handle: Mutex<Option<JoinHandle<()>>>,
    sweeper: Sweeper,
    event_tx: broadcast::Sender<JobEvent>,
    call_timeout: Duration,
}

/// Cloneable handle to the job registry.
///
/// Build one at startup with [`JobManager::start`] and hand clones to every
/// consumer. Starting a manager also starts its sweeper.
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<ManagerInner>,
}

impl JobManager {
    /// Start a registry and sweeper.
    ///
    /// Finished results are written under `config.results_dir` when it is set.
    pub async fn start(config: ManagerConfig) -> Result<Self, RegistryError> {
        let sink: Option<Arc<dyn ResultSink>> = match config.results_dir {
            Some(ref dir) => {
                let sink = JsonFileSink::new(dir);
                sink.init().await?;
                Some(Arc::new(sink))
            }
            None => None,
        };
        Self::start_with_sink(config, sink).await
    }

    /// Start a registry that records finished results to `sink`.
    pub async fn start_with_sink(
        config: ManagerConfig,
        sink: Option<Arc<dyn ResultSink>>,
    ) -> Result<Self, RegistryError> {
        let (event_tx, _) = broadcast::channel(1024);
        let call_timeout = config.call_timeout;
        let sweep_interval = config.sweep_interval;

        let (registry, handle) = start_registry(RegistryArgs {
            config,
            event_tx: event_tx.clone(),
            sink,
        })
        .await
        .map_err(|e| RegistryError::Unavailable(format!("Failed to spawn registry: {}", e)))?;

        let sweeper = Sweeper::spawn(registry.clone(), sweep_interval);

        Ok(Self {
            inner: Arc::new(ManagerInner {
                registry,
                registry_handle: Mutex::new(Some(handle)),
                sweeper,
                event_tx,
                call_timeout,
            }),
        })
    }

    async fn call<T, F>(&self, build: F) -> Result<T, RegistryError>
    where
        T: Send + 'static,
        F: FnOnce(RpcReplyPort<T>) -> RegistryMessage,
    {
        let result =
            ractor::rpc::call(&self.inner.registry, build, Some(self.inner.call_timeout)).await;
        match result {
            Ok(CallResult::Success(value)) => Ok(value),
            Ok(CallResult::Timeout) => Err(RegistryError::Timeout),
            Ok(CallResult::SenderError) => {
                Err(RegistryError::Unavailable("registry dropped the reply".into()))
            }
            Err(e) => Err(RegistryError::Unavailable(e.to_string())),
        }
    }

    /// Spawn a worker for a new job.
    pub async fn start_job(&self) -> Result<JobTicket, RegistryError> {
        self.call(|reply| RegistryMessage::Start { reply }).await?
    }

    /// Snapshot every tracked job, in start order.
    pub async fn list_progress(&self) -> Result<Vec<JobSnapshot>, RegistryError> {
        self.call(|reply| RegistryMessage::ListProgress { reply })
            .await
    }

    /// Ask a job to terminate, by its string token.
    ///
    /// Unknown or malformed ids are a silent no-op. The job stays listed
    /// until a cleanup pass evicts it.
    pub async fn kill(&self, job_id: &str) -> Result<(), RegistryError> {
        match JobId::parse(job_id) {
            Ok(id) => self.kill_job(id).await.map(|_| ()),
            Err(_) => {
                tracing::debug!("Ignoring kill for malformed job id {:?}", job_id);
                Ok(())
            }
        }
    }

    /// Ask a job to terminate. Returns whether a live worker was signalled.
    pub async fn kill_job(&self, job_id: JobId) -> Result<bool, RegistryError> {
        self.call(|reply| RegistryMessage::Kill {
            job_id,
            reply: Some(reply),
        })
        .await
    }

    /// Run a cleanup pass now.
    pub async fn cleanup(&self) -> Result<CleanupReport, RegistryError> {
        self.call(|reply| RegistryMessage::Cleanup { reply: Some(reply) })
            .await
    }

    /// Subscribe to job events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn sweeper_running(&self) -> bool {
        self.inner.sweeper.is_running()
    }

    /// Check whether two handles refer to the same registry.
    pub fn same_registry(&self, other: &JobManager) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Stop the sweeper and the registry, killing any tracked workers.
    pub async fn shutdown(&self) {
        self.inner.sweeper.stop();
        let _ = self.inner.registry.send_message(RegistryMessage::Shutdown);

        if let Some(handle) = self.inner.registry_handle.lock().await.take()
            && let Err(e) = handle.await
        {
            tracing::warn!("Registry task ended abnormally: {}", e);
        }
    }
}
