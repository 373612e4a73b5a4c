//! Solver descriptors and the optimizer capability.
//!
//! Every solver the hub can run implements [`Optimizer`]: one synchronous
//! `optimize(input) → SolverOutput` call. Implementations are bound to
//! descriptors in a registry at process start; nothing is loaded at runtime.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FailureKind;
use crate::schedule::ScheduleReport;

/// Registry identifier of a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SolverId(pub i64);

impl fmt::Display for SolverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Names the implementation a descriptor points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImplementationRef {
    /// Unit the implementation lives in (e.g. `crowdflow_engine`).
    pub module: String,
    /// Capability name inside the unit (e.g. `TafweejOptimizer`).
    pub entry_point: String,
}

impl ImplementationRef {
    pub fn new(module: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            entry_point: entry_point.into(),
        }
    }
}

impl fmt::Display for ImplementationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.module, self.entry_point)
    }
}

/// A published registry entry. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverDescriptor {
    pub id: SolverId,
    pub name: String,
    pub implementation: ImplementationRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SolverDescriptor {
    pub fn new(id: i64, name: impl Into<String>, implementation: ImplementationRef) -> Self {
        Self {
            id: SolverId(id),
            name: name.into(),
            implementation,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A failed solve as reported by an optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Structured diagnostics (e.g. the round that failed, partial dispatch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl SolverFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Input, message)
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

impl fmt::Display for SolverFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Result of one optimizer invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverOutput {
    /// A crowd-flow schedule.
    Schedule(ScheduleReport),
    /// Any other solver-defined payload.
    Generic(Value),
    /// The solver ran but produced no usable result.
    Error(SolverFailure),
}

impl SolverOutput {
    /// Serialized result payload for a successful output.
    ///
    /// Returns `None` for [`SolverOutput::Error`].
    pub fn to_payload(&self) -> Option<Value> {
        match self {
            SolverOutput::Schedule(report) => serde_json::to_value(report).ok(),
            SolverOutput::Generic(value) => Some(value.clone()),
            SolverOutput::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SolverOutput::Error(_))
    }
}

/// The capability every registered solver exposes.
pub trait Optimizer: Send + Sync {
    /// Short implementation name used in logs.
    fn name(&self) -> &str;

    /// Runs the solver on a decoded-but-untyped input payload.
    ///
    /// Blocking. Implementations report bad payloads as
    /// [`SolverOutput::Error`] with [`FailureKind::Input`] rather than panicking.
    fn optimize(&self, input: &Value) -> SolverOutput;
}
