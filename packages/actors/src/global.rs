//! Process-wide job manager.

use pi_core::ManagerConfig;
use tokio::sync::OnceCell;

use crate::manager::JobManager;
use crate::messages::RegistryError;

/// Global manager instance.
static MANAGER: OnceCell<JobManager> = OnceCell::const_new();

/// Get the process-wide manager, starting it on first use.
///
/// Concurrent first calls race on a single initializer, so exactly one
/// registry and one sweeper are ever started. `config` is ignored once the
/// manager exists.
pub async fn global_manager(config: ManagerConfig) -> Result<&'static JobManager, RegistryError> {
    MANAGER
        .get_or_try_init(|| async {
            tracing::info!("Starting process-wide job manager");
            JobManager::start(config).await
        })
        .await
}

/// Get the process-wide manager if it has been started.
pub fn try_global_manager() -> Option<&'static JobManager> {
    MANAGER.get()
}
