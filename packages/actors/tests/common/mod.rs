#![allow(dead_code)]

use std::time::{Duration, Instant};

use actors::{JobManager, RegistryError};
use pi_core::{JobId, JobSnapshot, ManagerConfig, WorkerCommand};

/// Reports half of a 100-unit run, then idles until killed.
pub const HALF_WAY: &str = r#"echo '{"kind":"progress","completed":50}'; exec sleep 30"#;

/// Runs to completion with a fixed estimate.
pub const FINISHES: &str = r#"echo '{"kind":"progress","completed":100}'; echo '{"kind":"finished","estimate":3.125}'"#;

/// Runs to completion without a single crossing.
pub const NO_CROSSINGS: &str = r#"echo '{"kind":"progress","completed":100}'; echo '{"kind":"finished","estimate":null}'"#;

/// Dies part way through without a final report.
pub const CRASHES: &str = r#"echo '{"kind":"progress","completed":10}'; exit 3"#;

/// Never reports anything.
pub const SLEEPS: &str = "exec sleep 30";

/// Worker that runs `script` under `/bin/sh`.
///
/// The registry's `--iterations` flags land in `$1`/`$2` and are ignored.
pub fn scripted(script: &str) -> WorkerCommand {
    WorkerCommand::new("/bin/sh")
        .with_arg("-c")
        .with_arg(script)
        .with_arg("fake-worker")
}

/// 100-unit jobs, a sweeper that never fires during a test.
pub fn config(script: &str) -> ManagerConfig {
    ManagerConfig::default()
        .with_iterations(100)
        .with_worker(scripted(script))
        .with_sweep_interval(Duration::from_secs(3600))
        .with_call_timeout(Duration::from_secs(5))
}

pub async fn find(manager: &JobManager, id: JobId) -> Result<Option<JobSnapshot>, RegistryError> {
    Ok(manager.list_progress().await?.into_iter().find(|j| j.id == id))
}

/// Poll until `pred` holds for job `id`, or fail after five seconds.
pub async fn wait_for<P>(manager: &JobManager, id: JobId, pred: P) -> Result<JobSnapshot, Box<dyn std::error::Error>>
where
    P: Fn(&JobSnapshot) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = find(manager, id).await?;
        if let Some(ref job) = snapshot
            && pred(job)
        {
            return Ok(job.clone());
        }
        if Instant::now() > deadline {
            return Err(format!("job {} never reached the expected state: {:?}", id, snapshot).into());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
