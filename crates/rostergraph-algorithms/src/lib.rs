pub mod common;
pub mod similarity;
pub mod ego;
pub mod topology;

pub use common::{
    id_of, index_of, Adjacency, AdjacencyView, DenseAdjacency, NodeId, Row, SparseAdjacency,
    StorageStrategy, Weight, DEFAULT_DENSE_BUDGET_BYTES,
};
pub use similarity::{combined_score, cosine, find_top_k, jaccard, ScoredPair, SimilarityConfig, TopK};
pub use ego::{ego_network, ego_network_sizes, EgoSizes};
pub use topology::{
    degree_summary, edge_weight_histogram, mean_edge_weights, node_degrees, weighted_degrees,
    DegreeSummary,
};
