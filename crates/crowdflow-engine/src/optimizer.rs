//! The crowd-flow scheduling capability as a registrable optimizer.

use crowdflow_config::EngineConfig;
use crowdflow_core::{ImplementationRef, Optimizer, SolverDescriptor, SolverFailure, SolverOutput};
use serde_json::Value;
use tracing::debug;

use crate::controller::TwoPhaseController;
use crate::extract::extract;
use crate::lp::{GoodLpBackend, SolverBackend};
use crate::problem::SchedulingProblem;

pub const TAFWEEJ_SOLVER_ID: i64 = 1;
pub const TAFWEEJ_SOLVER_NAME: &str = "tafweej_scheduling";
pub const TAFWEEJ_MODULE: &str = "crowdflow_engine";
pub const TAFWEEJ_ENTRY_POINT: &str = "TafweejOptimizer";

/// Decodes a [`SchedulingProblem`], solves it in two rounds and extracts
/// the report.
#[derive(Debug, Clone, Default)]
pub struct TafweejOptimizer<B = GoodLpBackend> {
    controller: TwoPhaseController<B>,
}

impl TafweejOptimizer {
    /// Optimizer on the default backend.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_backend(GoodLpBackend::new(), config)
    }

    pub fn implementation() -> ImplementationRef {
        ImplementationRef::new(TAFWEEJ_MODULE, TAFWEEJ_ENTRY_POINT)
    }

    /// Built-in registry entry.
    pub fn descriptor() -> SolverDescriptor {
        SolverDescriptor::new(TAFWEEJ_SOLVER_ID, TAFWEEJ_SOLVER_NAME, Self::implementation())
            .with_description("Two-phase crowd-flow scheduling over a chain of capacity-limited segments")
    }
}

impl<B: SolverBackend> TafweejOptimizer<B> {
    pub fn with_backend(backend: B, config: EngineConfig) -> Self {
        Self {
            controller: TwoPhaseController::new(backend, config),
        }
    }

    pub fn controller(&self) -> &TwoPhaseController<B> {
        &self.controller
    }
}

impl<B: SolverBackend> Optimizer for TafweejOptimizer<B> {
    fn name(&self) -> &str {
        TAFWEEJ_SOLVER_NAME
    }

    fn optimize(&self, input: &Value) -> SolverOutput {
        let outcome = SchedulingProblem::from_value(input).and_then(|p| self.controller.solve(&p));
        match outcome {
            Ok(solved) => SolverOutput::Schedule(extract(&solved)),
            Err(err) => {
                debug!(kind = %err.kind(), error = %err, "scheduling failed");
                SolverOutput::Error(SolverFailure::from(err))
            }
        }
    }
}
