//! Tests for the job lifecycle manager.

use std::sync::Arc;
use std::time::Duration;

use crowdflow_core::{
    CrowdflowError, FailureKind, JobStatus, JobSubmission, OPTIMAL_STATUS,
};
use crowdflow_test::{jobs, problems};
use serde_json::json;

use crate::lifecycle::{Failure, JobLifecycleManager, Outcome, Verdict, FINALIZE_ATTEMPTS};
use crate::store::{JobStore, MemoryJobStore};
use crate::test_utils::{
    test_registry, DuplicatingStore, FlakyCompleteStore, INFEASIBLE_ID, PANIC_ID, SLEEPY_ID,
};

fn manager() -> JobLifecycleManager {
    JobLifecycleManager::new(Arc::new(MemoryJobStore::new()), Arc::new(test_registry()))
}

/// Submits, claims and processes one job, returning the outcome.
async fn run_one(manager: &JobLifecycleManager, submission: JobSubmission) -> Outcome {
    let submitted = manager.store().submit(submission).await.unwrap();
    let job = manager.claim_next().await.unwrap().unwrap();
    assert_eq!(job.id, submitted.id);
    manager.process(job).await.unwrap()
}

// ============================================================================
// Outcome payloads
// ============================================================================

#[test]
fn test_success_payload() {
    let outcome = Outcome::success(Duration::from_millis(3), json!({"x": 1}));
    assert!(outcome.is_success());
    assert_eq!(outcome.status(), JobStatus::Finished);
    assert_eq!(outcome.failure_kind(), None);
    assert_eq!(outcome.payload(), json!({"status": "success", "result": {"x": 1}}));
}

#[test]
fn test_failure_payload_merges_detail() {
    let failure = Failure {
        kind: FailureKind::Infeasible,
        message: "no schedule".into(),
        detail: Some(json!({"round": 2, "kind": "ignored"})),
    };
    let payload = Outcome::failure(Duration::ZERO, failure).payload();
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["kind"], "infeasible");
    assert_eq!(payload["message"], "no schedule");
    assert_eq!(payload["round"], 2);
}

#[test]
fn test_failure_payload_with_scalar_detail() {
    let failure = Failure {
        kind: FailureKind::Backend,
        message: "boom".into(),
        detail: Some(json!("raw")),
    };
    assert_eq!(failure.to_payload()["detail"], "raw");
    assert_eq!(Failure::input("bad").to_payload()["kind"], "input");
}

// ============================================================================
// Running jobs
// ============================================================================

#[tokio::test]
async fn test_scheduling_job_finishes() {
    let manager = manager();
    let outcome = run_one(&manager, jobs::tafweej_submission()).await;
    assert!(outcome.is_success(), "{:?}", outcome.verdict);

    let stored = manager.store().list(None).await.unwrap().remove(0);
    assert_eq!(stored.status, JobStatus::Finished);
    assert!(stored.time_to_solve.is_some());

    let result = stored.result.unwrap();
    assert_eq!(result["status"], "success");
    let report = &result["result"];
    assert_eq!(report["status"], OPTIMAL_STATUS);
    let groups = report["decision_variables"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    for group in groups {
        let schedule = group["schedule"].as_array().unwrap();
        assert_eq!(schedule.last().unwrap()["segment"], 3);
    }
    assert_eq!(manager.in_flight(), 0);
}

#[tokio::test]
async fn test_infeasible_instance_fails_with_round() {
    let manager = manager();
    let outcome = run_one(&manager, jobs::tafweej_job(problems::oversized_group())).await;
    assert_eq!(outcome.failure_kind(), Some(FailureKind::Infeasible));

    let payload = outcome.payload();
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["round"], 2);
    assert_eq!(payload["dispatch_ticks"], json!([1]));

    let stored = manager.store().list(None).await.unwrap().remove(0);
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.result, Some(payload));
}

#[tokio::test]
async fn test_malformed_problem_is_input_failure() {
    let manager = manager();
    let outcome = run_one(&manager, jobs::tafweej_job(problems::backward_connection())).await;
    assert_eq!(outcome.failure_kind(), Some(FailureKind::Input));
}

#[tokio::test]
async fn test_unknown_solver_is_input_failure() {
    let manager = manager();
    let outcome = run_one(&manager, JobSubmission::new(999, json!({"data": [1]}))).await;
    match &outcome.verdict {
        Verdict::Failure(failure) => {
            assert_eq!(failure.kind, FailureKind::Input);
            assert!(failure.message.contains("#999"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_payload_is_input_failure() {
    let manager = manager();
    let outcome = run_one(&manager, jobs::echo_submission(json!(null))).await;
    assert_eq!(outcome.failure_kind(), Some(FailureKind::Input));
    assert_eq!(outcome.payload()["message"], "job input has no payload");
}

#[tokio::test]
async fn test_optimizer_name_fallback() {
    let manager = manager();
    let outcome = run_one(&manager, jobs::named_submission("echo", json!({"k": "v"}))).await;
    assert_eq!(outcome.verdict, Verdict::Success(json!({"k": "v"})));
}

#[tokio::test]
async fn test_panicking_solver_is_contained() {
    let manager = manager();
    let outcome = run_one(&manager, JobSubmission::new(PANIC_ID, json!({"data": [1]}))).await;
    match &outcome.verdict {
        Verdict::Failure(failure) => {
            assert_eq!(failure.kind, FailureKind::Panicked);
            assert!(failure.message.contains("solver exploded"));
            assert!(failure.message.contains("'panics'"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    let stored = manager.store().list(None).await.unwrap().remove(0);
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(manager.in_flight(), 0);
}

#[tokio::test]
async fn test_solver_failure_detail_is_stored() {
    let manager = manager();
    let outcome =
        run_one(&manager, JobSubmission::new(INFEASIBLE_ID, json!({"data": [1]}))).await;
    let payload = outcome.payload();
    assert_eq!(payload["kind"], "infeasible");
    assert_eq!(payload["dispatch_ticks"], json!([1]));
}

#[tokio::test]
async fn test_solve_deadline() {
    let manager = manager().with_solve_timeout(Some(Duration::from_millis(50)));
    let outcome =
        run_one(&manager, JobSubmission::new(SLEEPY_ID, json!({"data": [1]}))).await;
    assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
    assert!(outcome.payload()["message"]
        .as_str()
        .unwrap()
        .contains("50 ms"));

    let stored = manager.store().list(None).await.unwrap().remove(0);
    assert_eq!(stored.status, JobStatus::Failed);
}

#[tokio::test]
async fn test_run_is_synchronous_and_does_not_touch_store() {
    let manager = manager();
    let job = manager
        .store()
        .submit(jobs::echo_submission(json!([1, 2])))
        .await
        .unwrap();
    let outcome = manager.run(&job);
    assert_eq!(outcome.verdict, Verdict::Success(json!([1, 2])));

    let stored = manager.store().get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Queued);
}

// ============================================================================
// Exactly-once
// ============================================================================

#[tokio::test]
async fn test_finalize_twice_keeps_first_outcome() {
    let manager = manager();
    manager
        .store()
        .submit(jobs::echo_submission(json!(1)))
        .await
        .unwrap();
    let job = manager.claim_next().await.unwrap().unwrap();
    let outcome = manager.process(job.clone()).await.unwrap();
    assert!(outcome.is_success());

    let late = Outcome::failure(Duration::ZERO, Failure::input("late"));
    assert!(!manager.finalize(&job, &late).await.unwrap());

    let stored = manager.store().get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Finished);
}

#[tokio::test]
async fn test_double_hand_out_is_concurrency_violation() {
    let store: Arc<dyn JobStore> = Arc::new(DuplicatingStore::default());
    let manager = JobLifecycleManager::new(store, Arc::new(test_registry()));
    manager
        .store()
        .submit(jobs::echo_submission(json!(1)))
        .await
        .unwrap();

    let job = manager.claim_next().await.unwrap().unwrap();
    assert_eq!(manager.in_flight(), 1);
    match manager.claim_next().await {
        Err(CrowdflowError::ConcurrencyViolation(id)) => assert_eq!(id, job.id),
        other => panic!("expected concurrency violation, got {:?}", other),
    }

    // The first claimant still finishes normally.
    let outcome = manager.process(job).await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(manager.in_flight(), 0);
}

#[tokio::test]
async fn test_transient_store_error_on_finalize_is_retried() {
    let store = Arc::new(FlakyCompleteStore::new(1));
    let manager = JobLifecycleManager::new(store.clone(), Arc::new(test_registry()));
    manager
        .store()
        .submit(jobs::echo_submission(json!(1)))
        .await
        .unwrap();

    let job = manager.claim_next().await.unwrap().unwrap();
    let outcome = manager.process(job.clone()).await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(store.complete_attempts(), 2);
    assert_eq!(manager.in_flight(), 0);

    let stored = manager.store().get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Finished);
    assert!(stored.result.is_some());
}

#[tokio::test]
async fn test_persistent_store_error_on_finalize_gives_up() {
    let store = Arc::new(FlakyCompleteStore::new(usize::MAX));
    let manager = JobLifecycleManager::new(store.clone(), Arc::new(test_registry()));
    manager
        .store()
        .submit(jobs::echo_submission(json!(1)))
        .await
        .unwrap();

    let job = manager.claim_next().await.unwrap().unwrap();
    assert!(matches!(manager.process(job).await, Err(CrowdflowError::Store(_))));
    assert_eq!(store.complete_attempts(), FINALIZE_ATTEMPTS as usize);
    assert_eq!(manager.in_flight(), 0);
}

#[tokio::test]
async fn test_empty_queue() {
    let manager = manager();
    assert!(manager.claim_next().await.unwrap().is_none());
}
