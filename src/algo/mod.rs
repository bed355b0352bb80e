//! Graph algorithm jobs
//!
//! Kernels live in the `rostergraph-algorithms` crate and work on 0-based
//! matrix indices. This module is the integration layer: it maps node ids to
//! indices once and wraps each kernel as a distributor [`Job`].

use crate::distributor::Job;
use crate::graph::{GraphResult, GraphStore, NodeId, StorageStrategy, Weight};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

// Re-export algorithms
pub use rostergraph_algorithms::{
    combined_score, cosine, degree_summary, edge_weight_histogram, ego_network, find_top_k, jaccard,
    mean_edge_weights, node_degrees, weighted_degrees, DegreeSummary, EgoSizes, ScoredPair,
    SimilarityConfig,
};

/// Top-K unconnected candidates per source node
#[derive(Debug, Clone)]
pub struct SimilarityJob {
    /// Candidate matrix indices, shared by every worker
    candidates: Arc<[usize]>,
    config: SimilarityConfig,
}

impl SimilarityJob {
    /// Resolve candidate ids against the store
    pub fn new(store: &GraphStore, candidates: &[NodeId], config: SimilarityConfig) -> GraphResult<Self> {
        let candidates = candidates
            .iter()
            .map(|&id| store.index(id))
            .collect::<GraphResult<Vec<_>>>()?;
        Ok(Self {
            candidates: candidates.into(),
            config,
        })
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }
}

impl Job for SimilarityJob {
    type Output = Vec<ScoredPair>;

    fn name(&self) -> &'static str {
        "similarity"
    }

    fn compute(&self, store: &GraphStore, node: NodeId) -> Vec<ScoredPair> {
        match store.index(node) {
            Ok(idx) => find_top_k(store.adjacency(), idx, &self.candidates, &self.config),
            Err(_) => {
                trace!("Skipping unknown node {}", node);
                Vec::new()
            }
        }
    }

    fn is_empty(&self, output: &Vec<ScoredPair>) -> bool {
        output.is_empty()
    }
}

/// Ego network sizes for hops `1..=max_hops`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EgoJob {
    pub max_hops: usize,
}

impl EgoJob {
    pub fn new(max_hops: usize) -> Self {
        Self { max_hops }
    }
}

impl Job for EgoJob {
    type Output = EgoSizes;

    fn name(&self) -> &'static str {
        "ego"
    }

    fn compute(&self, store: &GraphStore, node: NodeId) -> EgoSizes {
        match store.index(node) {
            Ok(idx) => ego_network(store.adjacency(), idx, self.max_hops),
            Err(_) => {
                trace!("Skipping unknown node {}", node);
                EgoSizes { source: node, counts: Vec::new() }
            }
        }
    }

    fn is_empty(&self, output: &EgoSizes) -> bool {
        output.counts.is_empty()
    }
}

/// Descriptive statistics of a loaded graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub storage: StorageStrategy,
    /// Distinct neighbours per node
    pub degree: Option<DegreeSummary>,
    /// Sum of edge weights per node
    pub weighted_degree: Option<DegreeSummary>,
    /// Mean weight over all undirected edges
    pub mean_edge_weight: f64,
    /// Edge weight → number of edges
    pub weight_histogram: BTreeMap<Weight, usize>,
}

impl GraphStats {
    pub fn compute(store: &GraphStore) -> Self {
        let view = store.adjacency();
        let degrees: Vec<u64> = node_degrees(view).into_iter().map(|d| d as u64).collect();
        let weighted = weighted_degrees(view);
        let weight_histogram = edge_weight_histogram(view);

        let total_weight: u64 = weight_histogram
            .iter()
            .map(|(&w, &count)| w as u64 * count as u64)
            .sum();
        let mean_edge_weight = if store.edge_count() == 0 {
            0.0
        } else {
            total_weight as f64 / store.edge_count() as f64
        };

        Self {
            nodes: store.node_count(),
            edges: store.edge_count(),
            storage: store.storage(),
            degree: degree_summary(&degrees),
            weighted_degree: degree_summary(&weighted),
            mean_edge_weight,
            weight_histogram,
        }
    }
}
