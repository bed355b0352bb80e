//! Ego network expansion
//!
//! Counts how many nodes are reachable from a source within 1..=K hops.
//! Only frontier membership is tracked, never shortest-path distances.

use super::common::{id_of, AdjacencyView, NodeId};

/// Cumulative ego network sizes for one source node
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EgoSizes {
    pub source: NodeId,
    /// `counts[h - 1]` is the reach at hop `h`
    pub counts: Vec<usize>,
}

impl EgoSizes {
    /// `(hop, count / total)` for every hop
    pub fn fractions(&self, total_nodes: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let total = total_nodes.max(1) as f64;
        self.counts
            .iter()
            .enumerate()
            .map(move |(i, &count)| (i + 1, count as f64 / total))
    }
}

/// Size of the ego network of `source` for every hop count in `1..=max_hops`.
///
/// Hop 1 counts direct neighbours only. From hop 2 onwards the source itself
/// is counted once. Expansion stops scanning as soon as a hop reaches no new
/// node; the remaining hops repeat the last value.
///
/// Returns an empty vector when `max_hops < 1`.
pub fn ego_network_sizes<V: AdjacencyView + ?Sized>(
    view: &V,
    source: usize,
    max_hops: usize,
) -> Vec<usize> {
    if max_hops < 1 {
        return Vec::new();
    }

    let mut visited = vec![false; view.node_count()];
    // The source is marked so it is never counted as "reached"
    visited[source] = true;
    let mut reached = 0usize;
    let mut frontier = Vec::new();

    for (idx, _) in view.row(source).nonzero() {
        if !visited[idx] {
            visited[idx] = true;
            reached += 1;
            frontier.push(idx);
        }
    }

    let mut sizes = Vec::with_capacity(max_hops);
    sizes.push(reached);

    let mut next = Vec::new();
    for _ in 2..=max_hops {
        if !frontier.is_empty() {
            next.clear();
            for &v in &frontier {
                for (u, _) in view.row(v).nonzero() {
                    if !visited[u] {
                        visited[u] = true;
                        reached += 1;
                        next.push(u);
                    }
                }
            }
            std::mem::swap(&mut frontier, &mut next);
        }
        sizes.push(reached + 1);
    }

    sizes
}

/// [`ego_network_sizes`] tagged with the source node id
pub fn ego_network<V: AdjacencyView + ?Sized>(view: &V, source: usize, max_hops: usize) -> EgoSizes {
    EgoSizes {
        source: id_of(source),
        counts: ego_network_sizes(view, source, max_hops),
    }
}
