//! Vendor-neutral binary optimization model.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::ops::Index;

use super::backend::{BackendFailure, SolverBackend};
use super::conflict::{self, ConflictReport};

/// Tolerance used when checking assignments against constraints.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Handle to one declared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A named set of binary variables indexed by an arbitrary key.
#[derive(Debug, Clone)]
pub struct VarFamily<K> {
    name: String,
    vars: HashMap<K, VarId>,
}

impl<K: Hash + Eq> VarFamily<K> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &K) -> Option<VarId> {
        self.vars.get(key).copied()
    }

    /// Variable for a key known to be declared.
    ///
    /// # Panics
    ///
    /// Panics if `key` was not declared in this family.
    pub fn var(&self, key: &K) -> VarId
    where
        K: Debug,
    {
        self[key]
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Hash + Eq + Debug> Index<&K> for VarFamily<K> {
    type Output = VarId;

    /// # Panics
    ///
    /// Panics if `key` was not declared in this family.
    fn index(&self, key: &K) -> &VarId {
        match self.vars.get(key) {
            Some(var) => var,
            None => panic!("{:?} is not declared in variable family '{}'", key, self.name),
        }
    }
}

/// `constant + Σ coefficient·variable`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// Unweighted sum of the given variables.
    pub fn sum(vars: impl IntoIterator<Item = VarId>) -> Self {
        vars.into_iter().map(|v| (v, 1.0)).collect()
    }

    pub fn with_term(mut self, var: VarId, coefficient: f64) -> Self {
        self.add_term(var, coefficient);
        self
    }

    pub fn add_term(&mut self, var: VarId, coefficient: f64) {
        self.terms.push((var, coefficient));
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn constant_term(&self) -> f64 {
        self.constant
    }

    /// Value of the expression under a full assignment.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(var, coef)| coef * values.get(var.index()).copied().unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }
}

impl FromIterator<(VarId, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
            constant: 0.0,
        }
    }
}

/// Comparison of a linear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Le,
    Ge,
    Eq,
}

impl fmt::Display for Cmp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cmp::Le => "<=",
            Cmp::Ge => ">=",
            Cmp::Eq => "=",
        })
    }
}

/// `expr cmp rhs`, labelled for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    label: String,
    expr: LinearExpr,
    cmp: Cmp,
    rhs: f64,
}

impl Constraint {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn expr(&self) -> &LinearExpr {
        &self.expr
    }

    pub fn cmp(&self) -> Cmp {
        self.cmp
    }

    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    pub fn is_satisfied(&self, values: &[f64]) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.cmp {
            Cmp::Le => lhs <= self.rhs + FEASIBILITY_TOLERANCE,
            Cmp::Ge => lhs >= self.rhs - FEASIBILITY_TOLERANCE,
            Cmp::Eq => (lhs - self.rhs).abs() <= FEASIBILITY_TOLERANCE,
        }
    }
}

/// Optimization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub sense: Sense,
    pub expr: LinearExpr,
}

/// Outcome of [`ConstraintModel::solve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Error(String),
}

impl SolveStatus {
    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveStatus::Optimal)
    }
}

/// Binary variables, labelled linear constraints and one objective.
///
/// The model only lives in memory. Solving hands it to a [`SolverBackend`];
/// the assignment is readable until the next solve.
#[derive(Debug, Clone)]
pub struct ConstraintModel {
    name: String,
    var_names: Vec<String>,
    constraints: Vec<Constraint>,
    objective: Option<Objective>,
    status: Option<SolveStatus>,
    solution: Option<Vec<f64>>,
}

impl ConstraintModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            var_names: Vec::new(),
            constraints: Vec::new(),
            objective: None,
            status: None,
            solution: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares a single binary variable.
    pub fn add_binary(&mut self, name: impl Into<String>) -> VarId {
        let id = VarId(self.var_names.len());
        self.var_names.push(name.into());
        id
    }

    /// Declares one binary variable per key. Duplicate keys share a variable.
    pub fn add_binary_family<K, I>(&mut self, name: &str, keys: I) -> VarFamily<K>
    where
        K: Hash + Eq + Debug,
        I: IntoIterator<Item = K>,
    {
        let mut vars = HashMap::new();
        for key in keys {
            if vars.contains_key(&key) {
                continue;
            }
            let var = self.add_binary(format!("{}{:?}", name, key));
            vars.insert(key, var);
        }
        VarFamily {
            name: name.to_string(),
            vars,
        }
    }

    pub fn add_constraint(&mut self, label: impl Into<String>, expr: LinearExpr, cmp: Cmp, rhs: f64) {
        self.constraints.push(Constraint {
            label: label.into(),
            expr,
            cmp,
            rhs,
        });
    }

    pub fn set_objective(&mut self, sense: Sense, expr: LinearExpr) {
        self.objective = Some(Objective { sense, expr });
    }

    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn num_vars(&self) -> usize {
        self.var_names.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn var_name(&self, var: VarId) -> Option<&str> {
        self.var_names.get(var.index()).map(String::as_str)
    }

    /// Solves the model, replacing any previous assignment.
    pub fn solve(&mut self, backend: &dyn SolverBackend) -> SolveStatus {
        self.solution = None;
        let status = match backend.solve(self) {
            Ok(values) if values.len() == self.num_vars() => {
                self.solution = Some(values);
                SolveStatus::Optimal
            }
            Ok(values) => SolveStatus::Error(format!(
                "backend {} returned {} values for {} variables",
                backend.name(),
                values.len(),
                self.num_vars()
            )),
            Err(BackendFailure::Infeasible) => SolveStatus::Infeasible,
            Err(BackendFailure::Unbounded) => SolveStatus::Unbounded,
            Err(BackendFailure::Error(message)) => SolveStatus::Error(message),
        };
        self.status = Some(status.clone());
        status
    }

    /// Status of the last solve.
    pub fn status(&self) -> Option<&SolveStatus> {
        self.status.as_ref()
    }

    /// Assigned value; `None` unless the last solve was optimal.
    pub fn value(&self, var: VarId) -> Option<f64> {
        self.solution.as_ref()?.get(var.index()).copied()
    }

    /// Assigned value of a binary variable, rounded.
    pub fn is_set(&self, var: VarId) -> Option<bool> {
        self.value(var).map(|v| v > 0.5)
    }

    pub fn objective_value(&self) -> Option<f64> {
        let values = self.solution.as_ref()?;
        Some(self.objective.as_ref()?.expr.evaluate(values))
    }

    /// Labels of constraints the current assignment violates.
    pub fn violated_constraints(&self) -> Vec<&str> {
        match &self.solution {
            Some(values) => self
                .constraints
                .iter()
                .filter(|c| !c.is_satisfied(values))
                .map(Constraint::label)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Best-effort irreducible set of conflicting constraints.
    ///
    /// Returns `None` when the constraint set turns out feasible or the
    /// backend errors during probing.
    pub fn conflict_report(
        &self,
        backend: &dyn SolverBackend,
        max_probes: usize,
    ) -> Option<ConflictReport> {
        conflict::deletion_filter(self, backend, max_probes)
    }

    /// Same variables, the selected constraints, no objective.
    pub(crate) fn feasibility_probe(&self, keep: &[usize]) -> ConstraintModel {
        ConstraintModel {
            name: format!("{}_probe", self.name),
            var_names: self.var_names.clone(),
            constraints: keep
                .iter()
                .filter_map(|&i| self.constraints.get(i).cloned())
                .collect(),
            objective: None,
            status: None,
            solution: None,
        }
    }
}
