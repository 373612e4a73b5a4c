//! Conflicting-constraint reports for infeasible models.
//!
//! Uses a deletion filter: every constraint is dropped in turn, and stays
//! dropped if the remainder is still infeasible. What survives is an
//! irreducible infeasible subset, provided the probe budget lasts.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::backend::{BackendFailure, SolverBackend};
use super::model::ConstraintModel;

/// Constraint labels that are jointly infeasible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub constraints: Vec<String>,
    /// False when the probe budget ran out; the set is infeasible but may
    /// not be minimal.
    pub minimal: bool,
    pub probes: usize,
}

enum Probe {
    Feasible,
    Infeasible,
    Failed,
}

fn probe(model: &ConstraintModel, keep: &[usize], backend: &dyn SolverBackend) -> Probe {
    match backend.solve(&model.feasibility_probe(keep)) {
        Ok(_) => Probe::Feasible,
        Err(BackendFailure::Infeasible) => Probe::Infeasible,
        // A pure feasibility problem over binaries cannot be unbounded.
        Err(BackendFailure::Unbounded) | Err(BackendFailure::Error(_)) => Probe::Failed,
    }
}

pub(crate) fn deletion_filter(
    model: &ConstraintModel,
    backend: &dyn SolverBackend,
    max_probes: usize,
) -> Option<ConflictReport> {
    let mut active: Vec<usize> = (0..model.num_constraints()).collect();

    match probe(model, &active, backend) {
        Probe::Infeasible => {}
        Probe::Feasible | Probe::Failed => return None,
    }
    let mut probes = 1;
    let mut minimal = true;

    let mut i = 0;
    while i < active.len() {
        if probes >= max_probes {
            minimal = false;
            break;
        }
        let candidate: Vec<usize> = active
            .iter()
            .enumerate()
            .filter(|&(pos, _)| pos != i)
            .map(|(_, &c)| c)
            .collect();
        probes += 1;
        match probe(model, &candidate, backend) {
            Probe::Infeasible => active = candidate,
            Probe::Feasible => i += 1,
            Probe::Failed => return None,
        }
    }

    debug!(
        model = model.name(),
        probes,
        conflict_size = active.len(),
        minimal,
        "Conflict report computed"
    );

    Some(ConflictReport {
        constraints: active
            .iter()
            .map(|&c| model.constraints()[c].label().to_string())
            .collect(),
        minimal,
        probes,
    })
}
