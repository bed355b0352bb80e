//! Immutable in-memory graph store
//!
//! Owns the node id ↔ label mapping and the weighted adjacency structure.
//! Built once from node and edge tables, then shared read-only (typically
//! behind an `Arc`) by every worker. There is no mutating API after
//! [`GraphStore::build`].

use super::types::{EdgeRecord, Label, NodeId, NodeRecord, Weight};
use indexmap::IndexMap;
use rostergraph_algorithms::{
    index_of, Adjacency, AdjacencyView, Row, StorageStrategy, DEFAULT_DENSE_BUDGET_BYTES,
};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while building or querying the graph
#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("Node table is empty")]
    EmptyNodeTable,

    #[error("Node ids must be dense over 1..={expected}, found id {found}")]
    NonDenseNodeIds { expected: usize, found: NodeId },

    #[error("Node {0} is listed more than once")]
    DuplicateNode(NodeId),

    #[error("Edge ({a}, {b}) references node {node} which is not in 1..={node_count}")]
    UnknownNode {
        a: NodeId,
        b: NodeId,
        node: NodeId,
        node_count: usize,
    },

    #[error("Self-loop on node {0}")]
    SelfLoop(NodeId),

    #[error("Edge ({0}, {1}) has zero weight")]
    ZeroWeight(NodeId, NodeId),

    #[error("Node {0} not found")]
    NodeNotFound(NodeId),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Options controlling adjacency construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    pub strategy: StorageStrategy,
    /// Upper bound for a dense matrix when `strategy` is `Auto`
    pub dense_budget_bytes: u64,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            strategy: StorageStrategy::Auto,
            dense_budget_bytes: DEFAULT_DENSE_BUDGET_BYTES,
        }
    }
}

/// Read-only weighted, undirected graph
#[derive(Debug)]
pub struct GraphStore {
    /// Labels by index (node id - 1)
    labels: Vec<Label>,
    adjacency: Adjacency,
}

impl GraphStore {
    /// Build the store from node and edge tables.
    ///
    /// Node ids must cover `1..=N` exactly once. Edges must reference known
    /// nodes, must not be self-loops and must carry a positive weight.
    /// Repeated observations of the same unordered pair are summed into a
    /// single edge.
    pub fn build(
        nodes: Vec<NodeRecord>,
        edges: impl IntoIterator<Item = EdgeRecord>,
        options: BuildOptions,
    ) -> GraphResult<Self> {
        let node_count = nodes.len();
        if node_count == 0 {
            return Err(GraphError::EmptyNodeTable);
        }

        let mut slots: Vec<Option<Label>> = vec![None; node_count];
        for node in nodes {
            let idx = index_of(node.id)
                .filter(|&idx| idx < node_count)
                .ok_or(GraphError::NonDenseNodeIds {
                    expected: node_count,
                    found: node.id,
                })?;
            if slots[idx].is_some() {
                return Err(GraphError::DuplicateNode(node.id));
            }
            slots[idx] = Some(node.label);
        }
        // N distinct ids, all within 1..=N: every slot is filled
        let labels: Vec<Label> = slots.into_iter().flatten().collect();

        let mut weights: IndexMap<(NodeId, NodeId), Weight> = IndexMap::new();
        let mut observations = 0usize;
        for edge in edges {
            Self::validate_edge(&edge, node_count)?;
            let w = weights.entry(edge.key()).or_insert(0);
            *w = w.saturating_add(edge.weight);
            observations += 1;
        }

        let unique: Vec<(usize, usize, Weight)> = weights
            .into_iter()
            .map(|((a, b), w)| ((a - 1) as usize, (b - 1) as usize, w))
            .collect();

        if observations > unique.len() {
            debug!(
                "Collapsed {} edge rows into {} unique edges",
                observations,
                unique.len()
            );
        }

        let adjacency = Adjacency::build(
            options.strategy,
            node_count,
            &unique,
            options.dense_budget_bytes,
        );

        info!(
            "Graph store built: {} nodes, {} edges, {:?} adjacency",
            node_count,
            adjacency.edge_count(),
            adjacency.strategy()
        );

        Ok(Self { labels, adjacency })
    }

    fn validate_edge(edge: &EdgeRecord, node_count: usize) -> GraphResult<()> {
        for node in [edge.source, edge.target] {
            if node == 0 || node as usize > node_count {
                return Err(GraphError::UnknownNode {
                    a: edge.source,
                    b: edge.target,
                    node,
                    node_count,
                });
            }
        }
        if edge.source == edge.target {
            return Err(GraphError::SelfLoop(edge.source));
        }
        if edge.weight == 0 {
            return Err(GraphError::ZeroWeight(edge.source, edge.target));
        }
        Ok(())
    }

    /// Number of nodes (N)
    pub fn node_count(&self) -> usize {
        self.labels.len()
    }

    /// Number of unique undirected edges
    pub fn edge_count(&self) -> usize {
        self.adjacency.edge_count()
    }

    /// All node ids in ascending order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        1..=self.labels.len() as NodeId
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id >= 1 && id as usize <= self.labels.len()
    }

    /// Matrix index of a node
    pub fn index(&self, id: NodeId) -> GraphResult<usize> {
        if self.contains(id) {
            Ok((id - 1) as usize)
        } else {
            Err(GraphError::NodeNotFound(id))
        }
    }

    pub fn label(&self, id: NodeId) -> GraphResult<&Label> {
        let idx = self.index(id)?;
        Ok(&self.labels[idx])
    }

    /// Adjacency row of a node
    pub fn row(&self, id: NodeId) -> GraphResult<Row<'_>> {
        let idx = self.index(id)?;
        Ok(self.adjacency.row(idx))
    }

    /// Weighted degree: the sum of the node's row
    pub fn degree(&self, id: NodeId) -> GraphResult<u64> {
        let idx = self.index(id)?;
        Ok(self.adjacency.degree(idx))
    }

    /// Weight between two nodes, 0 when disconnected
    pub fn weight(&self, a: NodeId, b: NodeId) -> GraphResult<Weight> {
        let ia = self.index(a)?;
        let ib = self.index(b)?;
        Ok(self.adjacency.weight(ia, ib))
    }

    /// The adjacency view handed to algorithms
    pub fn adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    /// The concrete storage layout in use
    pub fn storage(&self) -> StorageStrategy {
        self.adjacency.strategy()
    }

    /// Label → node id lookup
    pub fn label_index(&self) -> FxHashMap<&str, NodeId> {
        self.labels
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.as_str(), idx as NodeId + 1))
            .collect()
    }
}
