//! Tests for the job stores.
//!
//! Every scenario runs against both implementations.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crowdflow_core::SolverRef;
use crowdflow_test::jobs;
use serde_json::json;
use tempfile::TempDir;

use super::*;

async fn sqlite_store(dir: &TempDir) -> Arc<dyn JobStore> {
    let url = format!("sqlite://{}", dir.path().join("jobs.db").display());
    let store = SqliteJobStore::connect(&url, 4).await.unwrap();
    store.migrate().await.unwrap();
    Arc::new(store)
}

fn memory_store() -> Arc<dyn JobStore> {
    Arc::new(MemoryJobStore::new())
}

// ============================================================================
// Scenarios
// ============================================================================

async fn submit_assigns_ids_and_queues(store: Arc<dyn JobStore>) {
    let first = store.submit(jobs::tafweej_submission()).await.unwrap();
    let second = store.submit(jobs::echo_submission(json!([1]))).await.unwrap();

    assert!(second.id > first.id);
    assert_eq!(first.status, JobStatus::Queued);
    assert_eq!(first.user_id, 7);

    let stored = store.get(first.id).await.unwrap().unwrap();
    assert_eq!(stored.input, first.input);
    assert_eq!(stored.solver, first.solver);
    assert_eq!(stored.status, JobStatus::Queued);
    assert!(store.get(JobId(9999)).await.unwrap().is_none());
}

async fn claim_takes_oldest_queued(store: Arc<dyn JobStore>) {
    let first = store.submit(jobs::echo_submission(json!(1))).await.unwrap();
    let second = store.submit(jobs::echo_submission(json!(2))).await.unwrap();

    let claimed = store.claim_next().await.unwrap().unwrap();
    assert_eq!(claimed.id, first.id);
    assert_eq!(claimed.status, JobStatus::Processing);

    let claimed = store.claim_next().await.unwrap().unwrap();
    assert_eq!(claimed.id, second.id);
    assert!(store.claim_next().await.unwrap().is_none());
}

async fn complete_is_conditional(store: Arc<dyn JobStore>) {
    let job = store.submit(jobs::echo_submission(json!(1))).await.unwrap();

    // Still queued: nothing to complete.
    assert!(!store
        .complete(job.id, JobStatus::Finished, None, None)
        .await
        .unwrap());

    store.claim_next().await.unwrap().unwrap();
    let result = json!({"status": "success", "result": 1});
    assert!(store
        .complete(
            job.id,
            JobStatus::Finished,
            Some(result.clone()),
            Some(Duration::from_millis(1500)),
        )
        .await
        .unwrap());
    // Terminal rows never change again.
    assert!(!store
        .complete(job.id, JobStatus::Failed, None, None)
        .await
        .unwrap());

    let stored = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Finished);
    assert_eq!(stored.result, Some(result));
    assert_eq!(stored.time_to_solve, Some(Duration::from_millis(1500)));
}

async fn complete_rejects_non_terminal_status(store: Arc<dyn JobStore>) {
    let job = store.submit(jobs::echo_submission(json!(1))).await.unwrap();
    store.claim_next().await.unwrap();
    assert!(store
        .complete(job.id, JobStatus::Queued, None, None)
        .await
        .is_err());
}

async fn list_filters_by_status(store: Arc<dyn JobStore>) {
    for submission in jobs::echo_batch(3) {
        store.submit(submission).await.unwrap();
    }
    store.claim_next().await.unwrap();

    assert_eq!(store.list(None).await.unwrap().len(), 3);
    assert_eq!(store.list(Some(JobStatus::Queued)).await.unwrap().len(), 2);
    let processing = store.list(Some(JobStatus::Processing)).await.unwrap();
    assert_eq!(processing.len(), 1);
    assert_eq!(processing[0].input["data"]["n"], 0);
}

async fn named_solver_round_trips(store: Arc<dyn JobStore>) {
    let by_name = store
        .submit(JobSubmission::new("tafweej_scheduling", json!({"data": [1]})))
        .await
        .unwrap();
    let unset = store
        .submit(jobs::named_submission("echo", json!([1])))
        .await
        .unwrap();

    let stored = store.get(by_name.id).await.unwrap().unwrap();
    assert_eq!(stored.solver, SolverRef::Name("tafweej_scheduling".into()));
    let stored = store.get(unset.id).await.unwrap().unwrap();
    assert!(stored.solver.is_unset());
    assert_eq!(stored.optimizer_name(), Some("echo"));
}

/// N queued jobs, M > N concurrent claimers: every job is claimed exactly once.
async fn concurrent_claims_are_exclusive(store: Arc<dyn JobStore>) {
    const JOBS: usize = 40;
    const CLAIMERS: usize = 64;

    for submission in jobs::echo_batch(JOBS) {
        store.submit(submission).await.unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..CLAIMERS {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            while let Some(job) = store.claim_next().await.unwrap() {
                claimed.push(job.id);
            }
            claimed
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    let unique: HashSet<JobId> = all.iter().copied().collect();
    assert_eq!(all.len(), JOBS, "some job was claimed twice or never");
    assert_eq!(unique.len(), JOBS);
    assert!(store.list(Some(JobStatus::Queued)).await.unwrap().is_empty());
}

// ============================================================================
// Memory store
// ============================================================================

#[tokio::test]
async fn test_memory_submit() {
    submit_assigns_ids_and_queues(memory_store()).await;
}

#[tokio::test]
async fn test_memory_claim_order() {
    claim_takes_oldest_queued(memory_store()).await;
}

#[tokio::test]
async fn test_memory_complete() {
    complete_is_conditional(memory_store()).await;
    complete_rejects_non_terminal_status(memory_store()).await;
}

#[tokio::test]
async fn test_memory_list() {
    list_filters_by_status(memory_store()).await;
}

#[tokio::test]
async fn test_memory_solver_refs() {
    named_solver_round_trips(memory_store()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_concurrent_claims() {
    concurrent_claims_are_exclusive(memory_store()).await;
}

// ============================================================================
// SQLite store
// ============================================================================

#[tokio::test]
async fn test_sqlite_submit() {
    let dir = TempDir::new().unwrap();
    submit_assigns_ids_and_queues(sqlite_store(&dir).await).await;
}

#[tokio::test]
async fn test_sqlite_claim_order() {
    let dir = TempDir::new().unwrap();
    claim_takes_oldest_queued(sqlite_store(&dir).await).await;
}

#[tokio::test]
async fn test_sqlite_complete() {
    let dir = TempDir::new().unwrap();
    complete_is_conditional(sqlite_store(&dir).await).await;
    let dir = TempDir::new().unwrap();
    complete_rejects_non_terminal_status(sqlite_store(&dir).await).await;
}

#[tokio::test]
async fn test_sqlite_list() {
    let dir = TempDir::new().unwrap();
    list_filters_by_status(sqlite_store(&dir).await).await;
}

#[tokio::test]
async fn test_sqlite_solver_refs() {
    let dir = TempDir::new().unwrap();
    named_solver_round_trips(sqlite_store(&dir).await).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_concurrent_claims() {
    let dir = TempDir::new().unwrap();
    concurrent_claims_are_exclusive(sqlite_store(&dir).await).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_claims_exclusive_across_pools() {
    const JOBS: usize = 30;

    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("shared.db").display());
    let first = SqliteJobStore::connect(&url, 4).await.unwrap();
    first.migrate().await.unwrap();
    let second = SqliteJobStore::connect(&url, 4).await.unwrap();
    for submission in jobs::echo_batch(JOBS) {
        first.submit(submission).await.unwrap();
    }

    let stores: Vec<Arc<dyn JobStore>> = vec![Arc::new(first), Arc::new(second)];
    let mut handles = Vec::new();
    for store in &stores {
        for _ in 0..8 {
            let store = Arc::clone(store);
            handles.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some(job) = store.claim_next().await.unwrap() {
                    claimed.push(job.id);
                }
                claimed
            }));
        }
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    let unique: HashSet<JobId> = all.iter().copied().collect();
    assert_eq!(all.len(), JOBS);
    assert_eq!(unique.len(), JOBS);
}

#[tokio::test]
async fn test_sqlite_in_memory_keeps_state() {
    let store = SqliteJobStore::connect("sqlite::memory:", 4).await.unwrap();
    store.migrate().await.unwrap();
    let job = store.submit(jobs::tafweej_submission()).await.unwrap();
    assert!(store.get(job.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_sqlite_migrate_is_repeatable() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("jobs.db").display());
    let store = SqliteJobStore::connect(&url, 1).await.unwrap();
    store.migrate().await.unwrap();
    store.migrate().await.unwrap();
}

#[tokio::test]
async fn test_open_uses_configured_backend() {
    let store = open(&StoreConfig::Memory).await.unwrap();
    assert_eq!(store.name(), "memory");

    let dir = TempDir::new().unwrap();
    let config = StoreConfig::Sqlite {
        url: format!("sqlite://{}", dir.path().join("hub.db").display()),
        max_connections: 2,
    };
    let store = open(&config).await.unwrap();
    assert_eq!(store.name(), "sqlite");
    store.submit(jobs::tafweej_submission()).await.unwrap();
}
