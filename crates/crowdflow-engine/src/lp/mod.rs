//! Constraint solver adapter.
//!
//! A small vendor-neutral modelling layer over binary optimization:
//! - [`ConstraintModel`]: binary variables, labelled linear constraints, one objective
//! - [`VarFamily`]: named variable sets indexed by tuple keys
//! - [`SolverBackend`]: the capability a third-party solver must provide
//! - [`GoodLpBackend`]: the default backend, `good_lp` over `microlp`
//! - [`ConflictReport`]: best-effort diagnostics for infeasible models
//!
//! Models accept more constraints after a solve and can be solved again,
//! which is what the two-round scheduling controller relies on.

mod backend;
mod conflict;
mod model;


pub use backend::{BackendFailure, GoodLpBackend, SolverBackend};
pub use conflict::ConflictReport;
pub use model::{
    Cmp, Constraint, ConstraintModel, LinearExpr, Objective, Sense, SolveStatus, VarFamily, VarId,
    FEASIBILITY_TOLERANCE,
};
