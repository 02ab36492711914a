//! Component E: hot-edge cutoff computation (`spec.md §4.E`).

use crate::callgraph::CallGraph;

/// Compute the minimum edge count an edge must have to be considered hot.
///
/// `p_cut` is the cumulative-weight cutoff percentage (`[0, 100]`);
/// `p_min` is the minimum-edge-count percentage (`[0, 100]`). Both the
/// cumulative-weight threshold and the minimum-edge-count threshold must
/// hold simultaneously at the chosen edge; if no edge in the
/// descending-by-count order satisfies both, the cutoff is `0` (every
/// edge is hot).
#[must_use]
pub fn compute_hot_cutoff(graph: &CallGraph, p_cut: u32, p_min: u32) -> i64 {
    let mut counts: Vec<i64> = graph.edge_indices().map(|e| graph.edge(e).count).collect();
    counts.sort_unstable_by(|a, b| b.cmp(a));

    let n_edges = counts.len();
    if n_edges == 0 {
        return 0;
    }

    let total: i128 = counts.iter().map(|&c| i128::from(c)).sum();
    let cum_cutoff = total * i128::from(p_cut) / 100;

    let mut cum: i128 = 0;
    for (i, &count) in counts.iter().enumerate() {
        cum += i128::from(count);
        let min_edge_ok = (i as u64) * 100 >= (n_edges as u64) * u64::from(p_min);
        if cum >= cum_cutoff && min_edge_ok {
            return count;
        }
    }
    0
}

/// Whether an edge of `count` meets a `cutoff` computed by
/// [`compute_hot_cutoff`]. Ties at the cutoff favor inclusion
/// (`spec.md §4.E`).
#[must_use]
pub fn is_hot(count: i64, cutoff: i64) -> bool {
    count >= cutoff
}
