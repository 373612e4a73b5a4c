//! Error types for Crowdflow

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::JobId;

/// Main error type for Crowdflow operations
#[derive(Debug, Error)]
pub enum CrowdflowError {
    /// Malformed or missing input
    #[error("Input error: {0}")]
    Input(String),

    /// Lookup by identifier or name found nothing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Registration collided with an existing entry
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The same job was handed to two claimers
    #[error("Job {0} was claimed twice")]
    ConcurrencyViolation(JobId),

    /// The job store failed
    #[error("Store error: {0}")]
    Store(String),

    /// Error in hub configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not occur in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Crowdflow operations
pub type Result<T> = std::result::Result<T, CrowdflowError>;

/// Classification of a failed job.
///
/// `Backend` and `Timeout` point at infrastructure trouble; the other kinds
/// are ordinary outcomes of a bad or unsolvable instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Malformed payload or unknown solver reference.
    Input,
    /// The optimization model has no feasible assignment.
    Infeasible,
    /// The optimization model is unbounded.
    Unbounded,
    /// The constraint solver backend itself failed.
    Backend,
    /// The solve exceeded the worker deadline and was abandoned.
    Timeout,
    /// The solver implementation panicked.
    Panicked,
}

impl FailureKind {
    /// Returns the kind as a string.
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Input => "input",
            FailureKind::Infeasible => "infeasible",
            FailureKind::Unbounded => "unbounded",
            FailureKind::Backend => "backend",
            FailureKind::Timeout => "timeout",
            FailureKind::Panicked => "panicked",
        }
    }

    /// Returns true for failures caused by infrastructure rather than the instance.
    pub fn is_infrastructure(self) -> bool {
        matches!(
            self,
            FailureKind::Backend | FailureKind::Timeout | FailureKind::Panicked
        )
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
