//! Scheduling problem instances.
//!
//! A problem is decoded from the job payload, either as a keyed object or as
//! the positional five-element array
//! `[group_sizes, starting_segments, num_ticks, connections, capacities]`.
//! [`SchedulingProblem::validate`] checks every structural invariant before
//! a model is built and returns the derived [`ProblemShape`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

/// Input of the crowd-flow scheduling engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingProblem {
    /// Size of every group.
    pub group_sizes: Vec<u32>,

    /// One 0/1 indicator row per group selecting its starting segment.
    pub starting_segments: Vec<Vec<u8>>,

    /// Length of the time horizon.
    #[serde(alias = "num_time")]
    pub num_ticks: usize,

    /// Square adjacency matrix; `connections[a][b] == 1` means `a → b`.
    #[serde(alias = "segments_connections")]
    pub connections: Vec<Vec<u8>>,

    /// Capacity of every segment.
    #[serde(alias = "road_capacities")]
    pub capacities: Vec<u32>,
}

/// Dimensions and derived facts of a validated problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemShape {
    pub num_groups: usize,
    pub num_ticks: usize,
    pub num_segments: usize,
    pub final_segment: usize,
    /// Starting segment of every group.
    pub start_segments: Vec<usize>,
    /// Connected pairs `(from, to)` in row-major order.
    pub edges: Vec<(usize, usize)>,
}

type PositionalProblem = (Vec<u32>, Vec<Vec<u8>>, usize, Vec<Vec<u8>>, Vec<u32>);

impl SchedulingProblem {
    pub fn new(
        group_sizes: Vec<u32>,
        starting_segments: Vec<Vec<u8>>,
        num_ticks: usize,
        connections: Vec<Vec<u8>>,
        capacities: Vec<u32>,
    ) -> Self {
        Self {
            group_sizes,
            starting_segments,
            num_ticks,
            connections,
            capacities,
        }
    }

    /// A forward chain `0 → 1 → … → n-1` where every group starts at segment 0.
    pub fn chain(group_sizes: Vec<u32>, capacities: Vec<u32>, num_ticks: usize) -> Self {
        let n = capacities.len();
        let starting_segments = group_sizes
            .iter()
            .map(|_| (0..n).map(|s| u8::from(s == 0)).collect())
            .collect();
        let connections = (0..n)
            .map(|a| (0..n).map(|b| u8::from(b == a + 1)).collect())
            .collect();
        Self::new(group_sizes, starting_segments, num_ticks, connections, capacities)
    }

    /// Decodes a payload in keyed or positional form.
    pub fn from_value(value: &Value) -> Result<Self, EngineError> {
        match value {
            Value::Array(items) if items.len() == 5 => {
                let (group_sizes, starting_segments, num_ticks, connections, capacities) =
                    serde_json::from_value::<PositionalProblem>(value.clone()).map_err(|e| {
                        EngineError::InvalidInput(format!("malformed positional problem: {}", e))
                    })?;
                Ok(Self::new(
                    group_sizes,
                    starting_segments,
                    num_ticks,
                    connections,
                    capacities,
                ))
            }
            Value::Array(items) => Err(EngineError::InvalidInput(format!(
                "positional problem needs 5 elements, got {}",
                items.len()
            ))),
            Value::Object(_) => serde_json::from_value(value.clone())
                .map_err(|e| EngineError::InvalidInput(format!("malformed problem: {}", e))),
            other => Err(EngineError::InvalidInput(format!(
                "problem must be an object or an array, got {}",
                json_type(other)
            ))),
        }
    }

    pub fn num_groups(&self) -> usize {
        self.group_sizes.len()
    }

    pub fn num_segments(&self) -> usize {
        self.capacities.len()
    }

    /// Highest-indexed segment, the absorbing sink.
    pub fn final_segment(&self) -> Option<usize> {
        self.num_segments().checked_sub(1)
    }

    /// Starting segment of `group`, if its indicator row selects exactly one.
    pub fn start_segment(&self, group: usize) -> Option<usize> {
        let row = self.starting_segments.get(group)?;
        let mut selected = row.iter().enumerate().filter(|&(_, &v)| v == 1).map(|(s, _)| s);
        match (selected.next(), selected.next()) {
            (Some(s), None) => Some(s),
            _ => None,
        }
    }

    /// Checks every structural invariant.
    pub fn validate(&self) -> Result<ProblemShape, EngineError> {
        let num_groups = self.num_groups();
        let num_segments = self.num_segments();

        if num_groups == 0 {
            return Err(invalid("at least one group is required"));
        }
        if num_segments == 0 {
            return Err(invalid("at least one segment is required"));
        }
        if self.num_ticks == 0 {
            return Err(invalid("num_ticks must be positive"));
        }
        if let Some(g) = self.group_sizes.iter().position(|&size| size == 0) {
            return Err(invalid(format!("group {} has size 0", g)));
        }
        if self.starting_segments.len() != num_groups {
            return Err(invalid(format!(
                "{} starting rows for {} groups",
                self.starting_segments.len(),
                num_groups
            )));
        }
        if self.connections.len() != num_segments {
            return Err(invalid(format!(
                "connection matrix has {} rows for {} segments",
                self.connections.len(),
                num_segments
            )));
        }

        let final_segment = num_segments - 1;

        let mut start_segments = Vec::with_capacity(num_groups);
        for (g, row) in self.starting_segments.iter().enumerate() {
            if row.len() != num_segments {
                return Err(invalid(format!(
                    "starting row of group {} has {} entries for {} segments",
                    g,
                    row.len(),
                    num_segments
                )));
            }
            if row.iter().any(|&v| v > 1) {
                return Err(invalid(format!("starting row of group {} is not 0/1", g)));
            }
            match self.start_segment(g) {
                Some(s) => start_segments.push(s),
                None => {
                    return Err(invalid(format!(
                        "starting row of group {} must select exactly one segment",
                        g
                    )))
                }
            }
        }

        let mut edges = Vec::new();
        for (from, row) in self.connections.iter().enumerate() {
            if row.len() != num_segments {
                return Err(invalid(format!(
                    "connection row {} has {} entries for {} segments",
                    from,
                    row.len(),
                    num_segments
                )));
            }
            for (to, &flag) in row.iter().enumerate() {
                match flag {
                    0 => {}
                    1 if to > from => edges.push((from, to)),
                    1 if to == from && from == final_segment => edges.push((from, to)),
                    1 => {
                        return Err(invalid(format!(
                            "connection {} -> {} does not move forward",
                            from, to
                        )))
                    }
                    _ => {
                        return Err(invalid(format!(
                            "connection {} -> {} is not 0/1",
                            from, to
                        )))
                    }
                }
            }
        }

        if let Some(stuck) =
            (0..final_segment).find(|&s| !edges.iter().any(|&(from, to)| from == s && to != s))
        {
            return Err(invalid(format!("segment {} has no outgoing connection", stuck)));
        }

        Ok(ProblemShape {
            num_groups,
            num_ticks: self.num_ticks,
            num_segments,
            final_segment,
            start_segments,
            edges,
        })
    }
}

fn invalid(message: impl Into<String>) -> EngineError {
    EngineError::InvalidInput(message.into())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
