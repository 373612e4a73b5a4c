//! Tests for job types.

use chrono::Utc;
use serde_json::json;

use super::job::*;
use super::solver::SolverId;

fn job_with_input(input: serde_json::Value) -> Job {
    Job::queued(JobId(1), JobSubmission::new(1, input), Utc::now())
}

// ============================================================================
// Status lifecycle
// ============================================================================

#[test]
fn test_status_transitions_are_monotonic() {
    use JobStatus::*;

    assert!(Queued.can_transition_to(Processing));
    assert!(Processing.can_transition_to(Finished));
    assert!(Processing.can_transition_to(Failed));

    assert!(!Queued.can_transition_to(Finished));
    assert!(!Processing.can_transition_to(Queued));
    assert!(!Finished.can_transition_to(Failed));
    assert!(!Failed.can_transition_to(Processing));
    assert!(!Finished.can_transition_to(Finished));
}

#[test]
fn test_status_round_trips_through_storage_string() {
    for status in [
        JobStatus::Queued,
        JobStatus::Processing,
        JobStatus::Finished,
        JobStatus::Failed,
    ] {
        assert_eq!(JobStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(JobStatus::parse("completed"), None);
    assert!(JobStatus::Failed.is_terminal());
    assert!(!JobStatus::Processing.is_terminal());
}

// ============================================================================
// Solver references
// ============================================================================

#[test]
fn test_solver_ref_deserializes_id_or_name() {
    let by_id: SolverRef = serde_json::from_value(json!(3)).unwrap();
    assert_eq!(by_id, SolverRef::Id(SolverId(3)));

    let by_name: SolverRef = serde_json::from_value(json!("tafweej_scheduling")).unwrap();
    assert_eq!(by_name, SolverRef::Name("tafweej_scheduling".into()));
}

#[test]
fn test_solver_ref_unset() {
    assert!(SolverRef::from(0).is_unset());
    assert!(SolverRef::from("  ").is_unset());
    assert!(!SolverRef::from(1).is_unset());
}

// ============================================================================
// Payload extraction
// ============================================================================

#[test]
fn test_payload_unwraps_data_envelope() {
    let job = job_with_input(json!({"data": {"num_ticks": 3}, "optimizer_name": "x"}));
    assert_eq!(job.payload(), Some(&json!({"num_ticks": 3})));
    assert_eq!(job.optimizer_name(), Some("x"));
}

#[test]
fn test_payload_without_envelope_is_whole_input() {
    let job = job_with_input(json!({"num_ticks": 3}));
    assert_eq!(job.payload(), Some(&json!({"num_ticks": 3})));
    assert_eq!(job.optimizer_name(), None);
}

#[test]
fn test_missing_payload() {
    assert_eq!(job_with_input(json!({})).payload(), None);
    assert_eq!(job_with_input(json!(null)).payload(), None);
    assert_eq!(job_with_input(json!({"data": null})).payload(), None);
    assert_eq!(job_with_input(json!({"data": []})).payload(), None);
    assert_eq!(job_with_input(json!({"optimizer_name": "x"})).payload(), None);
}

#[test]
fn test_job_serializes_time_to_solve_as_millis() {
    let mut job = job_with_input(json!({"data": [1]}));
    job.time_to_solve = Some(std::time::Duration::from_millis(1500));

    let value = serde_json::to_value(&job).unwrap();
    assert_eq!(value["time_to_solve"], json!(1500));
    assert_eq!(value["status"], json!("queued"));

    let back: Job = serde_json::from_value(value).unwrap();
    assert_eq!(back, job);
}
