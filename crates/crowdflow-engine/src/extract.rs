//! Turns a solved schedule into the 1-based result payload.

use crowdflow_core::{
    GroupSchedule, ScheduleEntry, ScheduleReport, SinkDwell, Visualization, OPTIMAL_STATUS,
};

use crate::controller::SolvedSchedule;

/// Builds the schedule report.
///
/// Each group's schedule starts at its dispatch tick and stops after the
/// first entry at the final segment. Dwell in the sink is reported
/// separately in `dwell`. The heatmap covers every tick, including any
/// presence before dispatch.
pub fn extract(solved: &SolvedSchedule) -> ScheduleReport {
    let decision_variables = (0..solved.num_groups())
        .map(|g| GroupSchedule {
            group: g + 1,
            schedule: group_schedule(solved, g),
        })
        .collect();

    let heatmap_data = (0..solved.num_segments())
        .map(|s| {
            (0..solved.num_ticks)
                .map(|t| solved.occupancy(s, t) as f64)
                .collect()
        })
        .collect();

    ScheduleReport {
        status: OPTIMAL_STATUS.to_string(),
        decision_variables,
        visualization: Visualization {
            heatmap_data,
            time_ticks: (1..=solved.num_ticks).collect(),
            segments: (1..=solved.num_segments()).collect(),
        },
        dispatch_ticks: solved.dispatch_ticks.iter().map(|t| t + 1).collect(),
        dwell: (0..solved.num_groups()).map(|g| sink_dwell(solved, g)).collect(),
    }
}

fn group_schedule(solved: &SolvedSchedule, group: usize) -> Vec<ScheduleEntry> {
    let mut schedule = Vec::new();
    for (t, segment) in ticks_from_dispatch(solved, group) {
        schedule.push(ScheduleEntry {
            tick: t + 1,
            segment: segment + 1,
        });
        if segment == solved.final_segment {
            break;
        }
    }
    schedule
}

fn sink_dwell(solved: &SolvedSchedule, group: usize) -> SinkDwell {
    let in_sink: Vec<usize> = ticks_from_dispatch(solved, group)
        .filter(|&(_, s)| s == solved.final_segment)
        .map(|(t, _)| t)
        .collect();
    SinkDwell {
        group: group + 1,
        arrival_tick: in_sink.first().map(|t| t + 1),
        ticks_in_sink: in_sink.len(),
    }
}

/// `(tick, segment)` for every tick from dispatch on where the group is present.
fn ticks_from_dispatch(
    solved: &SolvedSchedule,
    group: usize,
) -> impl Iterator<Item = (usize, usize)> + '_ {
    let from = solved.dispatch_ticks.get(group).copied().unwrap_or(0);
    solved
        .positions
        .get(group)
        .into_iter()
        .flat_map(move |row| row.iter().enumerate().skip(from))
        .filter_map(|(t, at)| at.map(|s| (t, s)))
}
