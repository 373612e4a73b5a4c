//! Tests for the worker pool.

use std::sync::Arc;
use std::time::Duration;

use crowdflow_config::WorkerConfig;
use crowdflow_core::{JobStatus, JobSubmission};
use crowdflow_test::jobs;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::JobLifecycleManager;
use crate::store::MemoryJobStore;
use crate::test_utils::{test_registry, PANIC_ID};
use crate::worker::{WorkerPool, WorkerStatsSnapshot};

fn worker_config(workers: usize) -> WorkerConfig {
    WorkerConfig {
        worker_count: workers,
        poll_interval_ms: 10,
        solve_timeout_secs: None,
    }
}

fn manager() -> Arc<JobLifecycleManager> {
    Arc::new(JobLifecycleManager::new(
        Arc::new(MemoryJobStore::new()),
        Arc::new(test_registry()),
    ))
}

/// Polls until no job is queued or processing.
async fn drain(manager: &JobLifecycleManager) {
    for _ in 0..500 {
        let open = manager
            .store()
            .list(None)
            .await
            .unwrap()
            .iter()
            .filter(|job| !job.status.is_terminal())
            .count();
        if open == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("jobs were not drained in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pool_processes_batch() {
    let manager = manager();
    for submission in jobs::echo_batch(12) {
        manager.store().submit(submission).await.unwrap();
    }
    manager
        .store()
        .submit(jobs::tafweej_submission())
        .await
        .unwrap();

    let pool = WorkerPool::spawn(Arc::clone(&manager), &worker_config(3), CancellationToken::new());
    drain(&manager).await;
    let stats = pool.shutdown().await;

    assert_eq!(
        stats,
        WorkerStatsSnapshot {
            claimed: 13,
            finished: 13,
            failed: 0,
            errors: 0,
        }
    );
    let finished = manager
        .store()
        .list(Some(JobStatus::Finished))
        .await
        .unwrap();
    assert_eq!(finished.len(), 13);
    assert_eq!(manager.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pool_survives_failing_jobs() {
    let manager = manager();
    manager
        .store()
        .submit(JobSubmission::new(PANIC_ID, json!({"data": [1]})))
        .await
        .unwrap();
    manager
        .store()
        .submit(jobs::echo_submission(json!(1)))
        .await
        .unwrap();

    let pool = WorkerPool::spawn(Arc::clone(&manager), &worker_config(1), CancellationToken::new());
    drain(&manager).await;
    let stats = pool.shutdown().await;

    assert_eq!(stats.claimed, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.finished, 1);
}

#[tokio::test]
async fn test_idle_pool_stops_on_external_cancel() {
    let manager = manager();
    let token = CancellationToken::new();
    let pool = WorkerPool::spawn(Arc::clone(&manager), &worker_config(2), token.clone());
    tokio::time::sleep(Duration::from_millis(30)).await;

    token.cancel();
    let stats = tokio::time::timeout(Duration::from_secs(5), pool.join())
        .await
        .expect("workers did not stop");
    assert_eq!(stats, WorkerStatsSnapshot::default());
}

#[tokio::test]
async fn test_cancelled_pool_claims_nothing() {
    let manager = manager();
    manager
        .store()
        .submit(jobs::echo_submission(json!(1)))
        .await
        .unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let pool = WorkerPool::spawn(Arc::clone(&manager), &worker_config(2), token);
    assert!(pool.token().is_cancelled());
    let stats = pool.join().await;

    assert_eq!(stats.claimed, 0);
    let queued = manager.store().list(Some(JobStatus::Queued)).await.unwrap();
    assert_eq!(queued.len(), 1);
}

#[tokio::test]
async fn test_zero_workers_still_starts_one() {
    let manager = manager();
    manager
        .store()
        .submit(jobs::echo_submission(json!(1)))
        .await
        .unwrap();

    let pool = WorkerPool::spawn(Arc::clone(&manager), &worker_config(0), CancellationToken::new());
    drain(&manager).await;
    let stats = pool.shutdown().await;
    assert_eq!(stats.finished, 1);
}
