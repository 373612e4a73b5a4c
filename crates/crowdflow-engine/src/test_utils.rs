//! Test utilities for crowdflow-engine
//!
//! Provides backends with fully predictable behavior for the crate's test modules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::lp::{BackendFailure, ConstraintModel, Sense, SolverBackend};

/// Enumerates every assignment; only usable for a handful of variables.
///
/// Ties are broken by enumeration order, so results are deterministic.
#[derive(Debug, Default)]
pub struct BruteForceBackend {
    calls: AtomicUsize,
}

impl BruteForceBackend {
    pub const MAX_VARS: usize = 16;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SolverBackend for BruteForceBackend {
    fn name(&self) -> &'static str {
        "brute_force"
    }

    fn solve(&self, model: &ConstraintModel) -> Result<Vec<f64>, BackendFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let n = model.num_vars();
        if n > Self::MAX_VARS {
            return Err(BackendFailure::Error(format!("{} variables is too many", n)));
        }

        let mut best: Option<(f64, Vec<f64>)> = None;
        for mask in 0u32..(1u32 << n) {
            let values: Vec<f64> = (0..n).map(|i| f64::from((mask >> i) & 1)).collect();
            if !model.constraints().iter().all(|c| c.is_satisfied(&values)) {
                continue;
            }
            let score = match model.objective() {
                Some(obj) => match obj.sense {
                    Sense::Minimize => obj.expr.evaluate(&values),
                    Sense::Maximize => -obj.expr.evaluate(&values),
                },
                None => 0.0,
            };
            if best.as_ref().map_or(true, |(b, _)| score < *b - 1e-9) {
                best = Some((score, values));
            }
        }
        best.map(|(_, values)| values)
            .ok_or(BackendFailure::Infeasible)
    }
}

/// Replays canned responses, one per call.
#[derive(Debug)]
pub struct ScriptedBackend {
    responses: Mutex<Vec<Result<Vec<f64>, BackendFailure>>>,
}

impl ScriptedBackend {
    /// Responses are returned in the given order.
    pub fn new(mut responses: Vec<Result<Vec<f64>, BackendFailure>>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
        }
    }
}

impl SolverBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn solve(&self, _model: &ConstraintModel) -> Result<Vec<f64>, BackendFailure> {
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(BackendFailure::Error("script exhausted".into())))
    }
}
