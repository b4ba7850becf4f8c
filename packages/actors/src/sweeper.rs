//! Periodic cleanup of stale jobs.

use std::time::Duration;

use ractor::ActorRef;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::messages::RegistryMessage;

/// Background task that asks the registry for a cleanup pass every interval.
///
/// The loop has no exit condition of its own; it ends when the registry is
/// gone or the sweeper is stopped.
pub struct Sweeper {
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Start sweeping `registry`. The first pass runs one `interval` from now.
    pub fn spawn(registry: ActorRef<RegistryMessage>, interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            tracing::debug!("Sweeper started, running cleanup every {:?}", interval);

            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if registry
                    .send_message(RegistryMessage::Cleanup { reply: None })
                    .is_err()
                {
                    tracing::info!("Registry is gone, sweeper exiting");
                    break;
                }
            }
        });

        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the sweeper. Idempotent.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
