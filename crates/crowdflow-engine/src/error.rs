//! Error types for the scheduling engine

use std::fmt;

use crowdflow_core::{FailureKind, SolverFailure};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::lp::ConflictReport;

/// One of the two sequential solves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Round {
    /// Capacity, single location and dispatch; fixes the dispatch ticks.
    One,
    /// Launch placement and movement on top of the fixed dispatch.
    Two,
}

impl Round {
    pub fn number(self) -> u8 {
        match self {
            Round::One => 1,
            Round::Two => 2,
        }
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round {}", self.number())
    }
}

/// Errors raised while decoding, building or solving a scheduling problem.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The payload does not describe a valid problem instance.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A round has no feasible assignment.
    #[error("{}", infeasible_message(*.round))]
    Infeasible {
        round: Round,
        /// Dispatch ticks fixed by round 1 (0-based), when round 2 failed.
        dispatch_ticks: Option<Vec<usize>>,
        conflict: Option<ConflictReport>,
    },

    /// A round's objective is unbounded.
    #[error("Model unbounded in {round}")]
    Unbounded { round: Round },

    /// The backend itself failed.
    #[error("Solver backend failed in {round}: {message}")]
    Backend { round: Round, message: String },
}

fn infeasible_message(round: Round) -> &'static str {
    match round {
        Round::One => "No feasible dispatch ordering (round 1 infeasible)",
        Round::Two => "No feasible movement schedule given the fixed dispatch order (round 2 infeasible)",
    }
}

impl EngineError {
    /// Failure classification for the job that ran into this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            EngineError::InvalidInput(_) => FailureKind::Input,
            EngineError::Infeasible { .. } => FailureKind::Infeasible,
            EngineError::Unbounded { .. } => FailureKind::Unbounded,
            EngineError::Backend { .. } => FailureKind::Backend,
        }
    }

    pub fn round(&self) -> Option<Round> {
        match self {
            EngineError::InvalidInput(_) => None,
            EngineError::Infeasible { round, .. }
            | EngineError::Unbounded { round }
            | EngineError::Backend { round, .. } => Some(*round),
        }
    }

    /// Structured diagnostics; dispatch ticks are reported 1-based.
    pub fn detail(&self) -> Option<Value> {
        match self {
            EngineError::InvalidInput(_) => None,
            EngineError::Infeasible {
                round,
                dispatch_ticks,
                conflict,
            } => {
                let mut detail = json!({ "round": round.number() });
                if let Some(ticks) = dispatch_ticks {
                    detail["dispatch_ticks"] = json!(ticks.iter().map(|t| t + 1).collect::<Vec<_>>());
                }
                if let Some(conflict) = conflict {
                    detail["conflict"] = json!(conflict);
                }
                Some(detail)
            }
            EngineError::Unbounded { round } | EngineError::Backend { round, .. } => {
                Some(json!({ "round": round.number() }))
            }
        }
    }
}

impl From<EngineError> for SolverFailure {
    fn from(err: EngineError) -> Self {
        let failure = SolverFailure::new(err.kind(), err.to_string());
        match err.detail() {
            Some(detail) => failure.with_detail(detail),
            None => failure,
        }
    }
}
