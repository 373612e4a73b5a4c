//! Job submissions.

use crowdflow_core::{JobSubmission, SolverId, SolverRef};
use serde_json::{json, Value};

use crate::problems::two_groups_chain;

/// Id of the built-in crowd-flow scheduling solver.
pub const TAFWEEJ_ID: i64 = 1;

/// Id and name the lifecycle tests register their echo optimizer under.
pub const ECHO_ID: i64 = 42;
pub const ECHO_NAME: &str = "echo";

/// Scheduling job wrapping `problem` in the `data` envelope.
pub fn tafweej_job(problem: Value) -> JobSubmission {
    JobSubmission::new(TAFWEEJ_ID, json!({ "data": problem })).with_user(7)
}

/// Scheduling job for [`two_groups_chain`].
pub fn tafweej_submission() -> JobSubmission {
    tafweej_job(two_groups_chain())
}

/// Job for the echo optimizer carrying `payload`.
pub fn echo_submission(payload: Value) -> JobSubmission {
    JobSubmission::new(ECHO_ID, json!({ "data": payload })).with_user(7)
}

/// Job without a solver reference, addressed by `optimizer_name` instead.
pub fn named_submission(optimizer_name: &str, payload: Value) -> JobSubmission {
    JobSubmission::new(
        SolverRef::Id(SolverId(0)),
        json!({ "optimizer_name": optimizer_name, "data": payload }),
    )
    .with_user(7)
}

/// `count` echo jobs numbered in their payload.
pub fn echo_batch(count: usize) -> Vec<JobSubmission> {
    (0..count).map(|i| echo_submission(json!({ "n": i }))).collect()
}
