//! Crowdflow - crowd-flow scheduling and an optimization job hub in Rust
//!
//! Submit jobs to a store, let workers route them to registered solvers, and
//! read back a schedule or a classified failure.
//!
//! # Example
//!
//! ```rust
//! use crowdflow::prelude::*;
//!
//! let problem = SchedulingProblem::chain(vec![4], vec![5, 5], 2);
//! let solved = TwoPhaseController::with_defaults().solve(&problem).unwrap();
//! let report = extract(&solved);
//! assert_eq!(report.dispatch_ticks, vec![1]);
//! assert_eq!(report.decision_variables[0].last_segment(), Some(2));
//! ```

pub use crowdflow_core::{
    CrowdflowError, FailureKind, GroupSchedule, ImplementationRef, Job, JobId, JobStatus,
    JobSubmission, Optimizer, Result, ScheduleEntry, ScheduleReport, SinkDwell, SolverDescriptor,
    SolverFailure, SolverId, SolverOutput, SolverRef, Visualization, OPTIMAL_STATUS,
};

pub use crowdflow_config::{
    ConfigError, DispatchPreference, EngineConfig, HubConfig, SolverEntryConfig, StoreConfig,
    WorkerConfig,
};

pub use crowdflow_engine::{
    extract, EngineError, GoodLpBackend, Round, SchedulingProblem, SolvedSchedule,
    TafweejOptimizer, TwoPhaseController,
};

pub use crowdflow_hub::{
    connect, JobLifecycleManager, JobStore, MemoryJobStore, Outcome, SolverRegistry,
    SqliteJobStore, WorkerPool,
};

/// Lower-level building blocks.
pub mod engine {
    pub use crowdflow_engine::*;
}

pub mod hub {
    pub use crowdflow_hub::*;
}

#[cfg(feature = "console")]
pub mod console;

pub mod prelude {
    pub use super::{
        extract, EngineConfig, GoodLpBackend, HubConfig, JobStatus, JobSubmission, Optimizer,
        ScheduleReport, SchedulingProblem, SolverOutput, TafweejOptimizer, TwoPhaseController,
    };
}
