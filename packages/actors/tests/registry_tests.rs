#![cfg(unix)]
#![allow(clippy::disallowed_methods)]

mod common;

use std::collections::HashSet;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use actors::{FnSink, JobManager, RegistryError, ResultRecord, ResultSink, SinkError};
use pi_core::{JobEvent, JobId, JobPhase, ManagerConfig, WorkerCommand};
use tokio::sync::mpsc;

use common::{CRASHES, FINISHES, HALF_WAY, NO_CROSSINGS, SLEEPS, config, find, wait_for};

#[tokio::test]
async fn test_half_way_progress_is_fifty_percent() -> Result<(), Box<dyn Error>> {
    let manager = JobManager::start(config(HALF_WAY)).await?;
    let ticket = manager.start_job().await?;
    assert!(ticket.pid > 0);

    let job = wait_for(&manager, ticket.id, |j| j.completed_units == 50).await?;
    assert_eq!(job.total_units, 100);
    assert_eq!(job.percent_complete, 50.0);
    assert_eq!(job.result, 0.0);
    assert_eq!(job.phase, JobPhase::Running);
    assert_eq!(job.pid, ticket.pid);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_finished_worker_publishes_result() -> Result<(), Box<dyn Error>> {
    let manager = JobManager::start(config(FINISHES)).await?;
    let ticket = manager.start_job().await?;

    let job = wait_for(&manager, ticket.id, |j| j.phase.is_terminal()).await?;
    assert_eq!(job.phase, JobPhase::Completed);
    assert_eq!(job.result, 3.125);
    assert_eq!(job.percent_complete, 100.0);

    // Finishing does not remove the entry.
    assert!(find(&manager, ticket.id).await?.is_some());

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_zero_crossings_reports_undefined() -> Result<(), Box<dyn Error>> {
    let manager = JobManager::start(config(NO_CROSSINGS)).await?;
    let ticket = manager.start_job().await?;

    let job = wait_for(&manager, ticket.id, |j| j.phase.is_terminal()).await?;
    assert_eq!(job.phase, JobPhase::Undefined);
    assert_eq!(job.result, 0.0);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_crashed_worker_freezes_progress() -> Result<(), Box<dyn Error>> {
    let manager = JobManager::start(config(CRASHES)).await?;
    let ticket = manager.start_job().await?;

    let job = wait_for(&manager, ticket.id, |j| j.phase.is_terminal()).await?;
    assert_eq!(job.phase, JobPhase::Stopped);
    assert_eq!(job.percent_complete, 10.0);
    assert_eq!(job.result, 0.0);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_percent_is_monotonic_and_bounded() -> Result<(), Box<dyn Error>> {
    let script = r#"for n in 10 20 30 40 50 60 70 80 90 100; do printf '{"kind":"progress","completed":%s}\n' "$n"; sleep 0.02; done"#;
    let manager = JobManager::start(config(script)).await?;
    let ticket = manager.start_job().await?;

    let mut last = 0.0;
    for _ in 0..200 {
        let Some(job) = find(&manager, ticket.id).await? else {
            break;
        };
        assert!((0.0..=100.0).contains(&job.percent_complete));
        assert!(job.percent_complete >= last, "{} went back to {}", last, job.percent_complete);
        last = job.percent_complete;
        if job.phase.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(last, 100.0);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_kill_unknown_id_is_a_no_op() -> Result<(), Box<dyn Error>> {
    let manager = JobManager::start(config(HALF_WAY)).await?;
    let ticket = manager.start_job().await?;

    manager.kill("unknown-id").await?;
    manager.kill(&JobId::new().to_string()).await?;
    assert!(!manager.kill_job(JobId::new()).await?);

    let jobs = manager.list_progress().await?;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, ticket.id);
    assert_eq!(jobs[0].phase, JobPhase::Running);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_kill_terminates_but_keeps_entry() -> Result<(), Box<dyn Error>> {
    let manager = JobManager::start(config(SLEEPS)).await?;
    let ticket = manager.start_job().await?;

    manager.kill(&ticket.id.to_string()).await?;

    // The worker's stdout closes once it has died.
    let job = wait_for(&manager, ticket.id, |j| j.phase == JobPhase::Stopped).await?;
    assert_eq!(job.id, ticket.id);

    // Still listed: a young job survives cleanup even after being killed.
    let report = manager.cleanup().await?;
    assert!(report.evicted.is_empty());
    assert_eq!(manager.list_progress().await?.len(), 1);

    // Once the process is gone there is nothing left to signal.
    let mut signalled = true;
    for _ in 0..100 {
        signalled = manager.kill_job(ticket.id).await?;
        if !signalled {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!signalled);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_cleanup_evicts_old_jobs_in_any_state() -> Result<(), Box<dyn Error>> {
    let manager = JobManager::start(
        config(FINISHES).with_job_timeout(Duration::from_millis(300)),
    )
    .await?;
    let finished = manager.start_job().await?;
    wait_for(&manager, finished.id, |j| j.phase == JobPhase::Completed).await?;

    tokio::time::sleep(Duration::from_millis(400)).await;
    let report = manager.cleanup().await?;

    assert_eq!(report.scanned, 1);
    assert_eq!(report.evicted_ids(), vec![finished.id]);
    assert!(report.evicted[0].age >= Duration::from_millis(300));
    assert!(report.evicted[0].outcome.is_exited());
    assert!(manager.list_progress().await?.is_empty());

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_cleanup_kills_running_jobs_past_timeout() -> Result<(), Box<dyn Error>> {
    let manager = JobManager::start(
        config(SLEEPS).with_job_timeout(Duration::from_millis(200)),
    )
    .await?;
    let running = manager.start_job().await?;

    tokio::time::sleep(Duration::from_millis(300)).await;
    let report = manager.cleanup().await?;

    assert_eq!(report.evicted.len(), 1);
    let eviction = &report.evicted[0];
    assert_eq!(eviction.job_id, running.id);
    assert_eq!(eviction.pid, running.pid);
    assert!(eviction.was_alive);
    assert!(eviction.outcome.is_exited(), "unexpected outcome: {}", eviction.outcome);
    assert!(find(&manager, running.id).await?.is_none());

    // Evicted ids are unknown from now on.
    manager.kill(&running.id.to_string()).await?;

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_cleanup_keeps_young_jobs() -> Result<(), Box<dyn Error>> {
    let manager = JobManager::start(config(HALF_WAY)).await?;
    let ticket = manager.start_job().await?;

    let report = manager.cleanup().await?;
    assert_eq!(report.scanned, 1);
    assert!(report.evicted.is_empty());
    assert!(find(&manager, ticket.id).await?.is_some());

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_sweeper_evicts_without_callers() -> Result<(), Box<dyn Error>> {
    let manager = JobManager::start(
        config(FINISHES)
            .with_job_timeout(Duration::from_millis(100))
            .with_sweep_interval(Duration::from_millis(100)),
    )
    .await?;
    assert!(manager.sweeper_running());
    let ticket = manager.start_job().await?;

    let mut gone = false;
    for _ in 0..100 {
        if find(&manager, ticket.id).await?.is_none() {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(gone, "sweeper never evicted job {}", ticket.id);
    assert!(manager.sweeper_running());

    manager.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_are_all_tracked() -> Result<(), Box<dyn Error>> {
    let manager = JobManager::start(config(SLEEPS)).await?;

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let manager = manager.clone();
        tasks.push(tokio::spawn(async move { manager.start_job().await }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        let ticket = task.await??;
        assert!(ids.insert(ticket.id), "duplicate id {}", ticket.id);
    }

    let jobs = manager.list_progress().await?;
    assert_eq!(jobs.len(), 16);
    let listed: HashSet<JobId> = jobs.iter().map(|j| j.id).collect();
    assert_eq!(listed, ids);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_spawn_failure_leaves_no_entry() -> Result<(), Box<dyn Error>> {
    let config = ManagerConfig::default()
        .with_worker(WorkerCommand::new("/nonexistent/pi-jobs-worker"))
        .with_sweep_interval(Duration::from_secs(3600));
    let manager = JobManager::start(config).await?;

    let result = manager.start_job().await;
    assert!(matches!(result, Err(RegistryError::Spawn(_))));
    assert!(manager.list_progress().await?.is_empty());

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_max_jobs_caps_admission() -> Result<(), Box<dyn Error>> {
    let manager = JobManager::start(config(SLEEPS).with_max_jobs(1)).await?;

    manager.start_job().await?;
    let second = manager.start_job().await;
    assert!(matches!(second, Err(RegistryError::AtCapacity { max: 1 })));
    assert_eq!(manager.list_progress().await?.len(), 1);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_events_follow_the_job() -> Result<(), Box<dyn Error>> {
    let manager = JobManager::start(config(FINISHES)).await?;
    let mut events = manager.subscribe();
    let ticket = manager.start_job().await?;

    let mut seen = Vec::new();
    let collect = async {
        while let Ok(event) = events.recv().await {
            let done = matches!(event, JobEvent::JobFinished { .. });
            seen.push(event);
            if done {
                break;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), collect).await?;

    assert!(matches!(seen.first(), Some(JobEvent::JobStarted { pid, .. }) if *pid == ticket.pid));
    assert!(matches!(
        seen.last(),
        Some(JobEvent::JobFinished { estimate: Some(v), .. }) if *v == 3.125
    ));
    assert!(seen.iter().all(|e| e.job_id() == ticket.id));

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_sink_receives_finished_results() -> Result<(), Box<dyn Error>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<ResultRecord>();
    let sink: Arc<dyn ResultSink> = Arc::new(FnSink::new(move |record| {
        let tx = tx.clone();
        Box::pin(async move {
            tx.send(record)
                .map_err(|e| SinkError::Rejected(e.to_string()))
        })
    }));

    let manager = JobManager::start_with_sink(config(FINISHES), Some(sink)).await?;
    let ticket = manager.start_job().await?;

    let record = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await?
        .ok_or("sink channel closed")?;
    assert_eq!(record.job_id, ticket.id);
    assert_eq!(record.estimate, Some(3.125));
    assert_eq!(record.completed_units, 100);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_failing_sink_does_not_affect_job() -> Result<(), Box<dyn Error>> {
    let sink: Arc<dyn ResultSink> = Arc::new(FnSink::new(|_record| {
        Box::pin(async { Err(SinkError::Rejected("database down".into())) })
    }));

    let manager = JobManager::start_with_sink(config(FINISHES), Some(sink)).await?;
    let ticket = manager.start_job().await?;

    let job = wait_for(&manager, ticket.id, |j| j.phase.is_terminal()).await?;
    assert_eq!(job.phase, JobPhase::Completed);
    assert_eq!(job.result, 3.125);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_results_dir_writes_json_records() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let results = dir.path().join("results");
    let manager = JobManager::start(config(FINISHES).with_results_dir(&results)).await?;
    let ticket = manager.start_job().await?;

    let path = results.join(format!("{}.json", ticket.id));
    for _ in 0..250 {
        if path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let record: ResultRecord = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(record.job_id, ticket.id);
    assert_eq!(record.estimate, Some(3.125));

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_calls_fail_after_shutdown() -> Result<(), Box<dyn Error>> {
    let manager = JobManager::start(config(SLEEPS)).await?;
    manager.start_job().await?;
    manager.shutdown().await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!manager.sweeper_running());
    assert!(matches!(
        manager.list_progress().await,
        Err(RegistryError::Unavailable(_))
    ));
    Ok(())
}
