//! Solver backends.

use good_lp::{
    default_solver, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use thiserror::Error;

use super::model::{Cmp, ConstraintModel, LinearExpr, Sense};

/// Why a backend returned no assignment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendFailure {
    #[error("model is infeasible")]
    Infeasible,

    #[error("model is unbounded")]
    Unbounded,

    #[error("backend error: {0}")]
    Error(String),
}

/// Anything that can optimize a [`ConstraintModel`].
///
/// `solve` blocks until the backend finishes and has no timeout of its own;
/// callers that need bounded latency abandon the call from outside.
pub trait SolverBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns one value per declared variable, in declaration order.
    fn solve(&self, model: &ConstraintModel) -> Result<Vec<f64>, BackendFailure>;
}

/// Backend built on `good_lp` with the pure-Rust `microlp` branch and bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpBackend;

impl GoodLpBackend {
    pub fn new() -> Self {
        Self
    }
}

fn to_expression(expr: &LinearExpr, handles: &[Variable]) -> Expression {
    let mut out = Expression::from(expr.constant_term());
    for &(var, coef) in expr.terms() {
        out += coef * handles[var.index()];
    }
    out
}

impl SolverBackend for GoodLpBackend {
    fn name(&self) -> &'static str {
        "good_lp/microlp"
    }

    fn solve(&self, model: &ConstraintModel) -> Result<Vec<f64>, BackendFailure> {
        let mut vars = ProblemVariables::new();
        let handles: Vec<Variable> = (0..model.num_vars())
            .map(|_| vars.add(variable().binary()))
            .collect();

        let (sense, objective) = match model.objective() {
            Some(obj) => (obj.sense, to_expression(&obj.expr, &handles)),
            None => (Sense::Minimize, Expression::from(0.0)),
        };
        let unsolved = match sense {
            Sense::Minimize => vars.minimise(objective),
            Sense::Maximize => vars.maximise(objective),
        };

        let mut problem = unsolved.using(default_solver);
        for c in model.constraints() {
            let lhs = to_expression(c.expr(), &handles);
            let built = match c.cmp() {
                Cmp::Le => good_lp::constraint::leq(lhs, c.rhs()),
                Cmp::Ge => good_lp::constraint::geq(lhs, c.rhs()),
                Cmp::Eq => good_lp::constraint::eq(lhs, c.rhs()),
            };
            problem.add_constraint(built);
        }

        match problem.solve() {
            Ok(solution) => Ok(handles.iter().map(|&v| solution.value(v)).collect()),
            Err(ResolutionError::Infeasible) => Err(BackendFailure::Infeasible),
            Err(ResolutionError::Unbounded) => Err(BackendFailure::Unbounded),
            Err(other) => Err(BackendFailure::Error(other.to_string())),
        }
    }
}
