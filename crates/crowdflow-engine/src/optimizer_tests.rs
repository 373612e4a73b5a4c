//! Tests for the registrable scheduling optimizer.

use crowdflow_config::EngineConfig;
use crowdflow_core::{FailureKind, Optimizer, SolverOutput};
use crowdflow_test::problems;
use serde_json::json;

use super::*;

#[test]
fn test_descriptor_is_builtin_entry() {
    let descriptor = TafweejOptimizer::descriptor();
    assert_eq!(descriptor.id.0, 1);
    assert_eq!(descriptor.name, "tafweej_scheduling");
    assert_eq!(
        descriptor.implementation.to_string(),
        "crowdflow_engine::TafweejOptimizer"
    );
    assert!(descriptor.description.is_some());
}

#[test]
fn test_optimize_returns_schedule() {
    let optimizer = TafweejOptimizer::new(EngineConfig::default());
    assert_eq!(optimizer.name(), TAFWEEJ_SOLVER_NAME);

    match optimizer.optimize(&problems::two_groups_chain()) {
        SolverOutput::Schedule(report) => {
            assert_eq!(report.decision_variables.len(), 2);
            for group in &report.decision_variables {
                assert_eq!(group.dispatch_tick(), Some(1));
                assert_eq!(group.last_segment(), Some(3));
            }
        }
        other => panic!("expected a schedule, got {:?}", other),
    }
}

#[test]
fn test_positional_payload_is_accepted() {
    let optimizer = TafweejOptimizer::new(EngineConfig::default());
    let output = optimizer.optimize(&problems::two_groups_chain_positional());
    assert!(matches!(output, SolverOutput::Schedule(_)));
}

#[test]
fn test_bad_payload_is_input_failure() {
    let optimizer = TafweejOptimizer::new(EngineConfig::default());

    for payload in [json!({"group_sizes": "many"}), problems::disconnected_chain()] {
        match optimizer.optimize(&payload) {
            SolverOutput::Error(failure) => {
                assert_eq!(failure.kind, FailureKind::Input);
                assert!(failure.detail.is_none());
            }
            other => panic!("expected an input failure, got {:?}", other),
        }
    }
}

#[test]
fn test_infeasible_failure_carries_round_and_dispatch() {
    let optimizer = TafweejOptimizer::new(EngineConfig::default().with_diagnostics());

    match optimizer.optimize(&problems::oversized_group()) {
        SolverOutput::Error(failure) => {
            assert_eq!(failure.kind, FailureKind::Infeasible);
            assert!(failure.message.contains("round 2"));
            let detail = failure.detail.unwrap();
            assert_eq!(detail["round"], 2);
            assert_eq!(detail["dispatch_ticks"], json!([1]));
            assert!(detail["conflict"]["constraints"].is_array());
        }
        other => panic!("expected an infeasible failure, got {:?}", other),
    }
}
