//! Result payload of the crowd-flow scheduling engine.
//!
//! Groups, ticks and segments are numbered from 1 in this payload, matching
//! what downstream consumers and heatmap renderers expect.

use serde::{Deserialize, Serialize};

/// Status text reported for a successful schedule.
pub const OPTIMAL_STATUS: &str = "Optimal solution found";

/// One position of a group: at `tick` the group occupies `segment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub tick: usize,
    pub segment: usize,
}

/// Ordered positions of one group from dispatch to first arrival at the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSchedule {
    pub group: usize,
    pub schedule: Vec<ScheduleEntry>,
}

impl GroupSchedule {
    /// Tick of the first entry, i.e. the dispatch tick.
    pub fn dispatch_tick(&self) -> Option<usize> {
        self.schedule.first().map(|e| e.tick)
    }

    /// Segment of the last recorded entry.
    pub fn last_segment(&self) -> Option<usize> {
        self.schedule.last().map(|e| e.segment)
    }
}

/// Segment-by-tick occupancy for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    /// `heatmap_data[segment][tick]`: size-weighted occupancy.
    pub heatmap_data: Vec<Vec<f64>>,
    pub time_ticks: Vec<usize>,
    pub segments: Vec<usize>,
}

impl Visualization {
    /// Occupancy of a 1-based `(segment, tick)` cell.
    pub fn occupancy(&self, segment: usize, tick: usize) -> Option<f64> {
        self.heatmap_data
            .get(segment.checked_sub(1)?)?
            .get(tick.checked_sub(1)?)
            .copied()
    }
}

/// Ticks a group spent in the sink after its first arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkDwell {
    pub group: usize,
    /// First tick at the final segment, if the group got there.
    pub arrival_tick: Option<usize>,
    /// Ticks present in the final segment, arrival tick included.
    pub ticks_in_sink: usize,
}

/// Full scheduling result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleReport {
    pub status: String,
    pub decision_variables: Vec<GroupSchedule>,
    pub visualization: Visualization,
    /// Dispatch tick fixed by the first solve round, per group.
    #[serde(default)]
    pub dispatch_ticks: Vec<usize>,
    #[serde(default)]
    pub dwell: Vec<SinkDwell>,
}

impl ScheduleReport {
    pub fn group(&self, group: usize) -> Option<&GroupSchedule> {
        self.decision_variables.iter().find(|g| g.group == group)
    }
}
