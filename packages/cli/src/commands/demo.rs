//! Drive a job manager end to end and print what it reports.

use std::time::Duration;

use actors::JobManager;
use pi_core::{ManagerConfig, WorkerCommand};

use crate::cli::DemoArgs;

fn demo_config(args: &DemoArgs) -> anyhow::Result<ManagerConfig> {
    let mut config = ManagerConfig::from_env()?;
    // Workers are this same executable unless PI_JOBS_WORKER points elsewhere.
    if std::env::var_os("PI_JOBS_WORKER").is_none() {
        config = config.with_worker(WorkerCommand::current_exe()?);
    }
    if let Some(iterations) = args.iterations {
        config = config.with_iterations(iterations);
    }
    if let Some(ref dir) = args.results_dir {
        config = config.with_results_dir(dir);
    }
    Ok(config)
}

pub(crate) async fn run(args: DemoArgs) -> anyhow::Result<()> {
    let config = demo_config(&args)?;
    tracing::info!("Starting {} jobs of {} drops", args.jobs, config.iterations);
    let manager = JobManager::start(config).await?;

    let mut tickets = Vec::with_capacity(args.jobs);
    for _ in 0..args.jobs {
        let ticket = manager.start_job().await?;
        println!("{}", serde_json::to_string(&ticket)?);
        tickets.push(ticket);
    }

    if args.kill_first
        && let Some(first) = tickets.first()
    {
        manager.kill(&first.id.to_string()).await?;
    }

    let mut poll = tokio::time::interval(Duration::from_millis(args.poll_ms.max(1)));
    loop {
        poll.tick().await;
        let progresses = manager.list_progress().await?;
        println!(
            "{}",
            serde_json::to_string(&serde_json::json!({ "progresses": progresses }))?
        );
        if progresses.iter().all(|job| job.phase.is_terminal()) {
            break;
        }
    }

    let report = manager.cleanup().await?;
    tracing::info!(
        "Final cleanup evicted {} of {} jobs",
        report.evicted.len(),
        report.scanned
    );
    manager.shutdown().await;
    Ok(())
}
