//! Scheduling problem payloads.
//!
//! All payloads use the keyed form unless the name says otherwise.
//!
//! # Example
//!
//! ```
//! use crowdflow_test::problems::two_groups_chain;
//!
//! let payload = two_groups_chain();
//! assert_eq!(payload["group_sizes"], serde_json::json!([5, 3]));
//! ```

use serde_json::{json, Value};

/// Forward chain `0 → 1 → … → n-1` as an adjacency matrix.
pub fn chain_connections(segments: usize) -> Vec<Vec<u8>> {
    (0..segments)
        .map(|a| (0..segments).map(|b| u8::from(b == a + 1)).collect())
        .collect()
}

/// Indicator row selecting `start` out of `segments`.
pub fn start_row(segments: usize, start: usize) -> Vec<u8> {
    (0..segments).map(|s| u8::from(s == start)).collect()
}

/// Groups of the given sizes, all starting at segment 0 of a chain.
pub fn chain_problem(group_sizes: &[u32], capacities: &[u32], num_ticks: usize) -> Value {
    let segments = capacities.len();
    json!({
        "group_sizes": group_sizes,
        "starting_segments": group_sizes.iter().map(|_| start_row(segments, 0)).collect::<Vec<_>>(),
        "num_ticks": num_ticks,
        "connections": chain_connections(segments),
        "capacities": capacities,
    })
}

/// Two groups (5 and 3) on a three-segment chain with capacity 10 each,
/// three ticks.
pub fn two_groups_chain() -> Value {
    chain_problem(&[5, 3], &[10, 10, 10], 3)
}

/// [`two_groups_chain`] in the positional array form.
pub fn two_groups_chain_positional() -> Value {
    json!([
        [5, 3],
        [[1, 0, 0], [1, 0, 0]],
        3,
        [[0, 1, 0], [0, 0, 1], [0, 0, 0]],
        [10, 10, 10]
    ])
}

/// A group of 20 where every segment holds 10.
pub fn oversized_group() -> Value {
    chain_problem(&[20], &[10, 10, 10], 3)
}

/// Two groups starting at different segments of a four-segment chain.
pub fn staggered_starts() -> Value {
    json!({
        "group_sizes": [4, 6],
        "starting_segments": [start_row(4, 0), start_row(4, 2)],
        "num_ticks": 4,
        "connections": chain_connections(4),
        "capacities": [10, 10, 10, 10],
    })
}

/// [`two_groups_chain`] with a backward connection `2 → 0`.
pub fn backward_connection() -> Value {
    let mut payload = two_groups_chain();
    payload["connections"][2][0] = json!(1);
    payload
}

/// [`two_groups_chain`] whose middle segment leads nowhere.
pub fn disconnected_chain() -> Value {
    let mut payload = two_groups_chain();
    payload["connections"][1][2] = json!(0);
    payload
}

/// [`two_groups_chain`] where group 0 selects two starting segments.
pub fn ambiguous_start() -> Value {
    let mut payload = two_groups_chain();
    payload["starting_segments"][0] = json!([1, 1, 0]);
    payload
}
