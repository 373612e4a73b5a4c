//! Time-expanded crowd-flow scheduling engine for Crowdflow.
//!
//! Groups of people move through a forward-only chain of capacity-limited
//! segments towards an absorbing final segment. The engine formulates that
//! movement as a binary optimization problem and solves it in two rounds:
//!
//! - [`lp`]: vendor-neutral constraint model and the `good_lp` backend
//! - [`problem`]: decoding and validation of problem instances
//! - [`builder`]: the round-one and round-two constraint sets
//! - [`controller`]: the two-phase solve
//! - [`extract`]: the 1-based schedule report
//! - [`optimizer`]: [`TafweejOptimizer`], the registrable capability
//!
//! # Examples
//!
//! ```
//! use crowdflow_config::EngineConfig;
//! use crowdflow_engine::{extract, GoodLpBackend, SchedulingProblem, TwoPhaseController};
//!
//! let problem = SchedulingProblem::chain(vec![5, 3], vec![10, 10, 10], 3);
//! let controller = TwoPhaseController::new(GoodLpBackend::new(), EngineConfig::default());
//!
//! let solved = controller.solve(&problem).unwrap();
//! let report = extract(&solved);
//! assert_eq!(report.group(1).unwrap().last_segment(), Some(3));
//! assert_eq!(report.group(2).unwrap().last_segment(), Some(3));
//! ```

pub mod builder;
pub mod controller;
pub mod error;
pub mod extract;
pub mod lp;
pub mod optimizer;
pub mod problem;

#[cfg(test)]
mod test_utils;

#[cfg(test)]
mod optimizer_tests;

pub use builder::{SchedulingModel, SchedulingModelBuilder};
pub use controller::{SolvedSchedule, TwoPhaseController};
pub use error::{EngineError, Round};
pub use extract::extract;
pub use lp::{ConflictReport, GoodLpBackend, SolverBackend};
pub use optimizer::{
    TafweejOptimizer, TAFWEEJ_ENTRY_POINT, TAFWEEJ_MODULE, TAFWEEJ_SOLVER_ID, TAFWEEJ_SOLVER_NAME,
};
pub use problem::{ProblemShape, SchedulingProblem};
