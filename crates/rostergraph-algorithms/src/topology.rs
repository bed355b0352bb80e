//! Graph topology statistics
//!
//! Degree and edge-weight distributions over an adjacency view.

use super::common::{AdjacencyView, Weight};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Number of distinct neighbours per node
pub fn node_degrees<V: AdjacencyView + ?Sized>(view: &V) -> Vec<usize> {
    (0..view.node_count())
        .into_par_iter()
        .map(|i| view.neighbor_count(i))
        .collect()
}

/// Weighted degree per node
pub fn weighted_degrees<V: AdjacencyView + ?Sized>(view: &V) -> Vec<u64> {
    (0..view.node_count())
        .into_par_iter()
        .map(|i| view.degree(i))
        .collect()
}

/// Mean positive edge weight per node (0.0 for isolated nodes)
pub fn mean_edge_weights<V: AdjacencyView + ?Sized>(view: &V) -> Vec<f64> {
    (0..view.node_count())
        .into_par_iter()
        .map(|i| {
            let neighbors = view.neighbor_count(i);
            if neighbors == 0 {
                0.0
            } else {
                view.degree(i) as f64 / neighbors as f64
            }
        })
        .collect()
}

/// Frequency of each edge weight. Every undirected edge is counted once.
pub fn edge_weight_histogram<V: AdjacencyView + ?Sized>(view: &V) -> BTreeMap<Weight, usize> {
    (0..view.node_count())
        .into_par_iter()
        .fold(BTreeMap::new, |mut acc, i| {
            for (j, w) in view.row(i).nonzero() {
                if j > i {
                    *acc.entry(w).or_insert(0) += 1;
                }
            }
            acc
        })
        .reduce(BTreeMap::new, |mut a, b| {
            for (w, count) in b {
                *a.entry(w).or_insert(0) += count;
            }
            a
        })
}

/// Summary of a degree distribution
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DegreeSummary {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    /// Nodes with degree 0
    pub isolated: usize,
}

/// Summarize a degree distribution. `None` for an empty graph.
pub fn degree_summary(degrees: &[u64]) -> Option<DegreeSummary> {
    let min = *degrees.iter().min()?;
    let max = *degrees.iter().max()?;
    let total: u64 = degrees.iter().sum();
    Some(DegreeSummary {
        min,
        max,
        mean: total as f64 / degrees.len() as f64,
        isolated: degrees.iter().filter(|&&d| d == 0).count(),
    })
}
