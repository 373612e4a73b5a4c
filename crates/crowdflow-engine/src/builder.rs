//! Time-expanded scheduling model.
//!
//! Round one declares every variable, the objective and constraints 1–3
//! (capacity, single location, single dispatch). Round two adds constraints
//! 4–7 (launch placement, forward movement, no backward movement, sink
//! absorption) once the dispatch tick of every group is known.

use crowdflow_config::{DispatchPreference, EngineConfig};

use crate::error::EngineError;
use crate::lp::{Cmp, ConstraintModel, LinearExpr, Sense, VarFamily};
use crate::problem::{ProblemShape, SchedulingProblem};

/// `(group, tick, segment)`
pub type PresenceKey = (usize, usize, usize);
/// `(group, tick)`
pub type DispatchKey = (usize, usize);

/// A constraint model with handles to its decision variables.
#[derive(Debug, Clone)]
pub struct SchedulingModel {
    model: ConstraintModel,
    presence: VarFamily<PresenceKey>,
    dispatch: VarFamily<DispatchKey>,
    shape: ProblemShape,
}

impl SchedulingModel {
    pub fn model(&self) -> &ConstraintModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut ConstraintModel {
        &mut self.model
    }

    pub fn presence(&self) -> &VarFamily<PresenceKey> {
        &self.presence
    }

    pub fn dispatch(&self) -> &VarFamily<DispatchKey> {
        &self.dispatch
    }

    pub fn shape(&self) -> &ProblemShape {
        &self.shape
    }

    /// Tick whose dispatch indicator is set, per group.
    ///
    /// `None` unless the last solve was optimal and every group has a set
    /// indicator.
    pub fn dispatch_ticks(&self) -> Option<Vec<usize>> {
        (0..self.shape.num_groups)
            .map(|g| {
                (0..self.shape.num_ticks).find(|&t| {
                    self.dispatch
                        .get(&(g, t))
                        .and_then(|var| self.model.is_set(var))
                        .unwrap_or(false)
                })
            })
            .collect()
    }

    /// `positions[g][t]`: segment occupied by group `g` at tick `t`.
    ///
    /// `None` unless the last solve was optimal.
    pub fn presence_matrix(&self) -> Option<Vec<Vec<Option<usize>>>> {
        let mut matrix = Vec::with_capacity(self.shape.num_groups);
        for g in 0..self.shape.num_groups {
            let mut row = Vec::with_capacity(self.shape.num_ticks);
            for t in 0..self.shape.num_ticks {
                let mut at = None;
                for s in 0..self.shape.num_segments {
                    if self.model.is_set(self.presence.var(&(g, t, s)))? {
                        at = Some(s);
                        break;
                    }
                }
                row.push(at);
            }
            matrix.push(row);
        }
        Some(matrix)
    }
}

/// Builds the two rounds of the scheduling model for one problem.
#[derive(Debug)]
pub struct SchedulingModelBuilder<'a> {
    problem: &'a SchedulingProblem,
    shape: ProblemShape,
    preference: DispatchPreference,
}

impl<'a> SchedulingModelBuilder<'a> {
    /// Validates `problem`; nothing is declared for an invalid instance.
    pub fn new(problem: &'a SchedulingProblem, config: &EngineConfig) -> Result<Self, EngineError> {
        let shape = problem.validate()?;
        Ok(Self {
            problem,
            shape,
            preference: config.dispatch_preference,
        })
    }

    pub fn shape(&self) -> &ProblemShape {
        &self.shape
    }

    /// Variables, objective and constraints 1–3.
    pub fn build_round_one(&self) -> SchedulingModel {
        let ProblemShape {
            num_groups: groups,
            num_ticks: ticks,
            num_segments: segments,
            ..
        } = self.shape;
        let sizes = &self.problem.group_sizes;
        let caps = &self.problem.capacities;

        let mut model = ConstraintModel::new("tafweej_schedule");
        let presence = model.add_binary_family(
            "presence",
            (0..groups).flat_map(|g| {
                (0..ticks).flat_map(move |t| (0..segments).map(move |s| (g, t, s)))
            }),
        );
        let dispatch =
            model.add_binary_family("dispatch", (0..groups).flat_map(|g| (0..ticks).map(move |t| (g, t))));

        // Unused capacity: Σ_{t,s} (cap_s − Σ_g size_g·presence[g,t,s]).
        let total_capacity: f64 = caps.iter().map(|&c| f64::from(c)).sum::<f64>() * ticks as f64;
        let mut objective = LinearExpr::constant(total_capacity);
        for g in 0..groups {
            for t in 0..ticks {
                for s in 0..segments {
                    objective.add_term(presence[&(g, t, s)], -f64::from(sizes[g]));
                }
            }
        }
        if self.preference == DispatchPreference::Earliest {
            for g in 0..groups {
                for t in 1..ticks {
                    objective.add_term(dispatch[&(g, t)], t as f64);
                }
            }
        }
        model.set_objective(Sense::Minimize, objective);

        // 1. capacity
        for t in 0..ticks {
            for s in 0..segments {
                let load: LinearExpr = (0..groups)
                    .map(|g| (presence[&(g, t, s)], f64::from(sizes[g])))
                    .collect();
                model.add_constraint(format!("capacity_t{}_s{}", t, s), load, Cmp::Le, f64::from(caps[s]));
            }
        }

        // 2. single location
        for g in 0..groups {
            for t in 0..ticks {
                let here = LinearExpr::sum((0..segments).map(|s| presence[&(g, t, s)]));
                model.add_constraint(format!("single_location_g{}_t{}", g, t), here, Cmp::Le, 1.0);
            }
        }

        // 3. single dispatch
        for g in 0..groups {
            let once = LinearExpr::sum((0..ticks).map(|t| dispatch[&(g, t)]));
            model.add_constraint(format!("single_dispatch_g{}", g), once, Cmp::Eq, 1.0);
        }

        SchedulingModel {
            model,
            presence,
            dispatch,
            shape: self.shape.clone(),
        }
    }

    /// Constraints 4–7, given the dispatch tick of every group.
    pub fn add_round_two(
        &self,
        scheduling: &mut SchedulingModel,
        dispatch_ticks: &[usize],
    ) -> Result<(), EngineError> {
        let ProblemShape {
            num_groups: groups,
            num_ticks: ticks,
            num_segments: segments,
            final_segment,
            ..
        } = self.shape;

        if dispatch_ticks.len() != groups {
            return Err(EngineError::InvalidInput(format!(
                "{} dispatch ticks for {} groups",
                dispatch_ticks.len(),
                groups
            )));
        }
        if let Some(t) = dispatch_ticks.iter().find(|&&t| t >= ticks) {
            return Err(EngineError::InvalidInput(format!(
                "dispatch tick {} is outside the horizon of {} ticks",
                t, ticks
            )));
        }

        let presence = &scheduling.presence;
        let model = &mut scheduling.model;

        // 4. launch placement
        for (g, &t) in dispatch_ticks.iter().enumerate() {
            let start = self.shape.start_segments[g];
            for s in 0..segments {
                let rhs = if s == start { 1.0 } else { 0.0 };
                model.add_constraint(
                    format!("launch_g{}_t{}_s{}", g, t, s),
                    LinearExpr::sum([presence[&(g, t, s)]]),
                    Cmp::Eq,
                    rhs,
                );
            }
        }

        for g in 0..groups {
            for t in 0..ticks.saturating_sub(1) {
                // 5. forward movement along every connection
                for &(s1, s2) in &self.shape.edges {
                    let advance = LinearExpr::new()
                        .with_term(presence[&(g, t + 1, s2)], 1.0)
                        .with_term(presence[&(g, t, s1)], -1.0);
                    model.add_constraint(
                        format!("forward_g{}_t{}_s{}_to_s{}", g, t, s1, s2),
                        advance,
                        Cmp::Ge,
                        0.0,
                    );
                }

                // 6. no backward movement
                for s1 in 0..segments {
                    for s2 in 0..s1 {
                        model.add_constraint(
                            format!("no_backward_g{}_t{}_s{}_to_s{}", g, t, s1, s2),
                            LinearExpr::sum([presence[&(g, t, s1)], presence[&(g, t + 1, s2)]]),
                            Cmp::Le,
                            1.0,
                        );
                    }
                }

                // 7. the sink absorbs
                let stay = LinearExpr::new()
                    .with_term(presence[&(g, t, final_segment)], 1.0)
                    .with_term(presence[&(g, t + 1, final_segment)], -1.0);
                model.add_constraint(format!("absorb_g{}_t{}", g, t), stay, Cmp::Le, 0.0);
            }
        }

        Ok(())
    }
}
