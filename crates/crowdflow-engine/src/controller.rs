//! Two-phase solve controller.
//!
//! Round one solves capacity, single location and single dispatch, which
//! fixes a dispatch tick per group. Round two adds launch placement and the
//! movement rules to the same model and solves again. The decomposition is
//! an approximation of a one-shot formulation: round two inherits the
//! dispatch order of round one and never revisits it.

use std::time::Instant;

use crowdflow_config::EngineConfig;
use tracing::{debug, info, warn};

use crate::builder::{SchedulingModel, SchedulingModelBuilder};
use crate::error::{EngineError, Round};
use crate::lp::{ConflictReport, GoodLpBackend, SolveStatus, SolverBackend};
use crate::problem::SchedulingProblem;

/// A solved schedule, 0-based throughout.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedSchedule {
    pub group_sizes: Vec<u32>,
    pub capacities: Vec<u32>,
    pub num_ticks: usize,
    pub final_segment: usize,
    /// Dispatch tick fixed by round one, per group.
    pub dispatch_ticks: Vec<usize>,
    /// `positions[g][t]`: segment of group `g` at tick `t` after round two.
    pub positions: Vec<Vec<Option<usize>>>,
}

impl SolvedSchedule {
    pub fn num_groups(&self) -> usize {
        self.group_sizes.len()
    }

    pub fn num_segments(&self) -> usize {
        self.capacities.len()
    }

    /// Size-weighted occupancy of `segment` at `tick`.
    pub fn occupancy(&self, segment: usize, tick: usize) -> u64 {
        self.positions
            .iter()
            .zip(&self.group_sizes)
            .filter(|(row, _)| row.get(tick).copied().flatten() == Some(segment))
            .map(|(_, &size)| u64::from(size))
            .sum()
    }

    /// Objective value: capacity left unused over all ticks and segments.
    pub fn unused_capacity(&self) -> i64 {
        let mut unused = 0i64;
        for t in 0..self.num_ticks {
            for (s, &cap) in self.capacities.iter().enumerate() {
                unused += i64::from(cap) - self.occupancy(s, t) as i64;
            }
        }
        unused
    }
}

/// Runs both rounds on one backend.
#[derive(Debug, Clone, Default)]
pub struct TwoPhaseController<B = GoodLpBackend> {
    backend: B,
    config: EngineConfig,
}

impl TwoPhaseController {
    /// Controller on the bundled `good_lp` backend with default settings.
    pub fn with_defaults() -> Self {
        Self::new(GoodLpBackend::new(), EngineConfig::default())
    }
}

impl<B: SolverBackend> TwoPhaseController<B> {
    pub fn new(backend: B, config: EngineConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Solves `problem` in two sequential rounds on the calling thread.
    pub fn solve(&self, problem: &SchedulingProblem) -> Result<SolvedSchedule, EngineError> {
        let builder = SchedulingModelBuilder::new(problem, &self.config)?;
        let shape = builder.shape();
        info!(
            event = "solve_start",
            backend = self.backend.name(),
            groups = shape.num_groups,
            ticks = shape.num_ticks,
            segments = shape.num_segments,
        );

        let mut scheduling = builder.build_round_one();
        self.run_round(&mut scheduling, Round::One, None)?;
        let dispatch_ticks = scheduling.dispatch_ticks().ok_or_else(|| EngineError::Backend {
            round: Round::One,
            message: "solution has no dispatch tick for some group".to_string(),
        })?;
        debug!(event = "dispatch_fixed", dispatch_ticks = ?dispatch_ticks);

        builder.add_round_two(&mut scheduling, &dispatch_ticks)?;
        self.run_round(&mut scheduling, Round::Two, Some(&dispatch_ticks))?;
        let positions = scheduling.presence_matrix().ok_or_else(|| EngineError::Backend {
            round: Round::Two,
            message: "solution has no presence values".to_string(),
        })?;

        let solved = SolvedSchedule {
            group_sizes: problem.group_sizes.clone(),
            capacities: problem.capacities.clone(),
            num_ticks: shape.num_ticks,
            final_segment: shape.final_segment,
            dispatch_ticks,
            positions,
        };
        info!(
            event = "solve_end",
            unused_capacity = solved.unused_capacity(),
        );
        Ok(solved)
    }

    fn run_round(
        &self,
        scheduling: &mut SchedulingModel,
        round: Round,
        dispatch_ticks: Option<&[usize]>,
    ) -> Result<(), EngineError> {
        let start = Instant::now();
        let status = scheduling.model_mut().solve(&self.backend);
        let model = scheduling.model();
        info!(
            event = "round_end",
            round = round.number(),
            variables = model.num_vars(),
            constraints = model.num_constraints(),
            duration_ms = start.elapsed().as_millis() as u64,
            status = ?status,
        );

        match status {
            SolveStatus::Optimal => Ok(()),
            SolveStatus::Infeasible => {
                warn!(round = round.number(), "model is infeasible");
                Err(EngineError::Infeasible {
                    round,
                    dispatch_ticks: dispatch_ticks.map(<[usize]>::to_vec),
                    conflict: self.diagnose(scheduling),
                })
            }
            SolveStatus::Unbounded => Err(EngineError::Unbounded { round }),
            SolveStatus::Error(message) => Err(EngineError::Backend { round, message }),
        }
    }

    fn diagnose(&self, scheduling: &SchedulingModel) -> Option<ConflictReport> {
        if !self.config.diagnose_infeasibility {
            return None;
        }
        scheduling
            .model()
            .conflict_report(&self.backend, self.config.max_conflict_probes)
    }
}
