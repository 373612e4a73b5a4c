//! Crowdflow Core - Core types and traits for the optimization hub
//!
//! This crate provides the shared vocabulary of Crowdflow:
//! - Job and submission types with the monotonic status lifecycle
//! - Solver descriptors and the [`Optimizer`] capability trait
//! - The tagged [`SolverOutput`] every optimizer returns
//! - The schedule report produced by the crowd-flow engine
//! - The error taxonomy shared by every crate

pub mod error;
pub mod job;
pub mod schedule;
pub mod solver;

#[cfg(test)]
mod job_tests;

pub use error::{CrowdflowError, FailureKind, Result};
pub use job::{Job, JobId, JobStatus, JobSubmission, SolverRef};
pub use schedule::{
    GroupSchedule, ScheduleEntry, ScheduleReport, SinkDwell, Visualization, OPTIMAL_STATUS,
};
pub use solver::{
    ImplementationRef, Optimizer, SolverDescriptor, SolverFailure, SolverId, SolverOutput,
};
