//! Shared utilities for graph algorithms
//!
//! Provides a read-only view of an undirected, weighted graph for algorithm
//! execution. Two storage layouts sit behind the same [`AdjacencyView`]
//! contract: a dense `N x N` matrix and a Compressed Sparse Row (CSR) layout.
//!
//! Indices used here are 0-based matrix indices. Node ids in the input tables
//! are 1-based, so node id `k` lives at index `k - 1`.

use ndarray::{Array2, ArrayView1};

/// Node identifier type (1-based, dense)
pub type NodeId = u32;

/// Edge weight: number of times two nodes were observed together
pub type Weight = u32;

/// Matrix index for a node id. `None` for id 0.
pub fn index_of(id: NodeId) -> Option<usize> {
    id.checked_sub(1).map(|i| i as usize)
}

/// Node id for a matrix index
pub fn id_of(idx: usize) -> NodeId {
    idx as NodeId + 1
}

/// A single adjacency row, borrowed from the underlying storage.
#[derive(Debug, Clone, Copy)]
pub enum Row<'a> {
    /// Full row of length N, zeros for missing edges
    Dense(ArrayView1<'a, Weight>),
    /// Sorted column indices with aligned weights
    Sparse {
        indices: &'a [usize],
        weights: &'a [Weight],
    },
}

impl<'a> Row<'a> {
    /// Weight towards `idx` (0 when disconnected)
    pub fn get(&self, idx: usize) -> Weight {
        match self {
            Row::Dense(view) => view.get(idx).copied().unwrap_or(0),
            Row::Sparse { indices, weights } => indices
                .binary_search(&idx)
                .map(|pos| weights[pos])
                .unwrap_or(0),
        }
    }

    /// Iterate `(index, weight)` over positive entries in ascending index order
    pub fn nonzero(&self) -> NonZero<'a> {
        NonZero { row: *self, pos: 0 }
    }

    /// Sum of the row (weighted degree)
    pub fn sum(&self) -> u64 {
        match self {
            Row::Dense(view) => view.iter().map(|&w| w as u64).sum(),
            Row::Sparse { weights, .. } => weights.iter().map(|&w| w as u64).sum(),
        }
    }
}

/// Iterator over the positive entries of a [`Row`]
pub struct NonZero<'a> {
    row: Row<'a>,
    pos: usize,
}

impl<'a> Iterator for NonZero<'a> {
    type Item = (usize, Weight);

    fn next(&mut self) -> Option<Self::Item> {
        match self.row {
            Row::Dense(view) => {
                while self.pos < view.len() {
                    let idx = self.pos;
                    self.pos += 1;
                    let w = view[idx];
                    if w > 0 {
                        return Some((idx, w));
                    }
                }
                None
            }
            Row::Sparse { indices, weights } => {
                let pos = self.pos;
                if pos < indices.len() {
                    self.pos += 1;
                    Some((indices[pos], weights[pos]))
                } else {
                    None
                }
            }
        }
    }
}

/// Read-only access to an undirected weighted adjacency structure.
///
/// Implementations must be symmetric: `weight(a, b) == weight(b, a)`, and
/// never hold a self-weight.
pub trait AdjacencyView: Send + Sync {
    /// Number of nodes (N)
    fn node_count(&self) -> usize;

    /// Number of undirected edges
    fn edge_count(&self) -> usize;

    /// Adjacency row of a node (by index)
    fn row(&self, idx: usize) -> Row<'_>;

    /// Weight between two nodes (by index), 0 when disconnected
    fn weight(&self, a: usize, b: usize) -> Weight {
        self.row(a).get(b)
    }

    /// Weighted degree: the sum of the node's row
    fn degree(&self, idx: usize) -> u64;

    /// Number of distinct neighbours
    fn neighbor_count(&self, idx: usize) -> usize;
}

/// Dense `N x N` adjacency matrix.
///
/// O(N²) memory, O(1) row access. Weighted degrees are cached at
/// construction so threshold filters never rescan rows.
#[derive(Debug, Clone)]
pub struct DenseAdjacency {
    matrix: Array2<Weight>,
    degrees: Vec<u64>,
    neighbor_counts: Vec<usize>,
    edge_count: usize,
}

impl DenseAdjacency {
    /// Build from a list of unique undirected edges `(a, b, weight)` (0-based)
    pub fn from_edges(node_count: usize, edges: &[(usize, usize, Weight)]) -> Self {
        let mut matrix = Array2::zeros((node_count, node_count));
        let mut degrees = vec![0u64; node_count];
        let mut neighbor_counts = vec![0usize; node_count];

        for &(a, b, w) in edges {
            matrix[[a, b]] = w;
            matrix[[b, a]] = w;
            degrees[a] += w as u64;
            degrees[b] += w as u64;
            neighbor_counts[a] += 1;
            neighbor_counts[b] += 1;
        }

        DenseAdjacency {
            matrix,
            degrees,
            neighbor_counts,
            edge_count: edges.len(),
        }
    }
}

impl AdjacencyView for DenseAdjacency {
    fn node_count(&self) -> usize {
        self.degrees.len()
    }

    fn edge_count(&self) -> usize {
        self.edge_count
    }

    fn row(&self, idx: usize) -> Row<'_> {
        Row::Dense(self.matrix.row(idx))
    }

    fn weight(&self, a: usize, b: usize) -> Weight {
        self.matrix[[a, b]]
    }

    fn degree(&self, idx: usize) -> u64 {
        self.degrees[idx]
    }

    fn neighbor_count(&self, idx: usize) -> usize {
        self.neighbor_counts[idx]
    }
}

/// Compressed Sparse Row adjacency.
///
/// Each undirected edge is stored in both endpoint rows. Row lookup is O(1),
/// iteration O(degree), point lookups binary-search the row.
#[derive(Debug, Clone)]
pub struct SparseAdjacency {
    node_count: usize,
    /// Offsets into `targets`. Size = node_count + 1
    offsets: Vec<usize>,
    /// Contiguous array of neighbour indices, sorted within each row
    targets: Vec<usize>,
    /// Edge weights, aligned with `targets`
    weights: Vec<Weight>,
    degrees: Vec<u64>,
    edge_count: usize,
}

impl SparseAdjacency {
    /// Build from a list of unique undirected edges `(a, b, weight)` (0-based)
    pub fn from_edges(node_count: usize, edges: &[(usize, usize, Weight)]) -> Self {
        let mut lists: Vec<Vec<(usize, Weight)>> = vec![Vec::new(); node_count];
        for &(a, b, w) in edges {
            lists[a].push((b, w));
            lists[b].push((a, w));
        }

        let mut offsets = Vec::with_capacity(node_count + 1);
        let mut targets = Vec::with_capacity(edges.len() * 2);
        let mut weights = Vec::with_capacity(edges.len() * 2);
        let mut degrees = Vec::with_capacity(node_count);

        offsets.push(0);
        for mut list in lists {
            list.sort_unstable_by_key(|&(idx, _)| idx);
            degrees.push(list.iter().map(|&(_, w)| w as u64).sum());
            for (idx, w) in list {
                targets.push(idx);
                weights.push(w);
            }
            offsets.push(targets.len());
        }

        SparseAdjacency {
            node_count,
            offsets,
            targets,
            weights,
            degrees,
            edge_count: edges.len(),
        }
    }
}

impl AdjacencyView for SparseAdjacency {
    fn node_count(&self) -> usize {
        self.node_count
    }

    fn edge_count(&self) -> usize {
        self.edge_count
    }

    fn row(&self, idx: usize) -> Row<'_> {
        let start = self.offsets[idx];
        let end = self.offsets[idx + 1];
        Row::Sparse {
            indices: &self.targets[start..end],
            weights: &self.weights[start..end],
        }
    }

    fn degree(&self, idx: usize) -> u64 {
        self.degrees[idx]
    }

    fn neighbor_count(&self, idx: usize) -> usize {
        self.offsets[idx + 1] - self.offsets[idx]
    }
}

/// Minimum edge density for `Auto` to pick the dense layout
pub const DENSE_MIN_DENSITY: f64 = 0.05;

/// Default memory budget for a dense matrix (2 GiB)
pub const DEFAULT_DENSE_BUDGET_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Storage layout selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum StorageStrategy {
    Dense,
    Sparse,
    /// Dense when the matrix fits the budget and the graph is dense enough
    #[default]
    Auto,
}

impl StorageStrategy {
    /// Resolve `Auto` into a concrete layout
    pub fn resolve(self, node_count: usize, edge_count: usize, dense_budget_bytes: u64) -> Self {
        match self {
            StorageStrategy::Auto => {
                let n = node_count as u64;
                let matrix_bytes = n
                    .saturating_mul(n)
                    .saturating_mul(std::mem::size_of::<Weight>() as u64);
                if matrix_bytes > dense_budget_bytes || node_count < 2 {
                    return StorageStrategy::Sparse;
                }
                let possible = (n * (n - 1) / 2) as f64;
                let density = edge_count as f64 / possible;
                if density >= DENSE_MIN_DENSITY {
                    StorageStrategy::Dense
                } else {
                    StorageStrategy::Sparse
                }
            }
            concrete => concrete,
        }
    }
}

/// Adjacency storage with the layout chosen at construction time
#[derive(Debug, Clone)]
pub enum Adjacency {
    Dense(DenseAdjacency),
    Sparse(SparseAdjacency),
}

impl Adjacency {
    /// Build the adjacency for unique undirected edges `(a, b, weight)` (0-based)
    pub fn build(
        strategy: StorageStrategy,
        node_count: usize,
        edges: &[(usize, usize, Weight)],
        dense_budget_bytes: u64,
    ) -> Self {
        match strategy.resolve(node_count, edges.len(), dense_budget_bytes) {
            StorageStrategy::Dense => Adjacency::Dense(DenseAdjacency::from_edges(node_count, edges)),
            _ => Adjacency::Sparse(SparseAdjacency::from_edges(node_count, edges)),
        }
    }

    /// The concrete layout in use
    pub fn strategy(&self) -> StorageStrategy {
        match self {
            Adjacency::Dense(_) => StorageStrategy::Dense,
            Adjacency::Sparse(_) => StorageStrategy::Sparse,
        }
    }
}

impl AdjacencyView for Adjacency {
    fn node_count(&self) -> usize {
        match self {
            Adjacency::Dense(d) => d.node_count(),
            Adjacency::Sparse(s) => s.node_count(),
        }
    }

    fn edge_count(&self) -> usize {
        match self {
            Adjacency::Dense(d) => d.edge_count(),
            Adjacency::Sparse(s) => s.edge_count(),
        }
    }

    fn row(&self, idx: usize) -> Row<'_> {
        match self {
            Adjacency::Dense(d) => d.row(idx),
            Adjacency::Sparse(s) => s.row(idx),
        }
    }

    fn weight(&self, a: usize, b: usize) -> Weight {
        match self {
            Adjacency::Dense(d) => d.weight(a, b),
            Adjacency::Sparse(s) => s.weight(a, b),
        }
    }

    fn degree(&self, idx: usize) -> u64 {
        match self {
            Adjacency::Dense(d) => d.degree(idx),
            Adjacency::Sparse(s) => s.degree(idx),
        }
    }

    fn neighbor_count(&self, idx: usize) -> usize {
        match self {
            Adjacency::Dense(d) => d.neighbor_count(idx),
            Adjacency::Sparse(s) => s.neighbor_count(idx),
        }
    }
}
