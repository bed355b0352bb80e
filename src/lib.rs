//! Rostergraph
//!
//! Batch analytics over a weighted, undirected player co-membership graph:
//! two players share an edge when they played on the same team, weighted by
//! how many seasons they did.
//!
//! # Computations
//!
//! - Similarity: for each source node, the top-K nodes it is *not* yet
//!   connected to, ranked by weighted Jaccard plus cosine similarity of
//!   adjacency rows
//! - Ego networks: for each source node, the fraction of the graph reachable
//!   within 1..=K hops
//! - Topology: degree and edge weight statistics
//!
//! Similarity and ego runs fan out over a worker pool and are resumable:
//! every finished node id goes to a checkpoint log after its result is
//! written, and a restarted run skips everything already logged.
//!
//! ## Example Usage
//!
//! ```rust
//! use rostergraph::graph::{BuildOptions, EdgeRecord, GraphStore, NodeRecord};
//! use rostergraph::algo::{find_top_k, SimilarityConfig};
//!
//! let nodes = vec![
//!     NodeRecord::new(1, "Ann"),
//!     NodeRecord::new(2, "Bo"),
//!     NodeRecord::new(3, "Cy"),
//! ];
//! let edges = vec![EdgeRecord::new(1, 2, 3), EdgeRecord::new(2, 3, 1)];
//! let store = GraphStore::build(nodes, edges, BuildOptions::default()).unwrap();
//!
//! // Ann and Cy both played with Bo but never with each other
//! let pairs = find_top_k(store.adjacency(), 0, &[0, 1, 2], &SimilarityConfig::default());
//! assert_eq!(pairs.len(), 1);
//! assert_eq!(pairs[0].target, 3);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod analysis;
pub mod config;
pub mod distributor;
pub mod error;
pub mod export;
pub mod graph;
pub mod persistence;
pub mod tables;

// Re-export main types for convenience
pub use graph::{
    BuildOptions, EdgeRecord, GraphError, GraphResult, GraphStore, Label, NodeId, NodeRecord,
    StorageStrategy, Weight,
};

pub use algo::{EgoJob, EgoSizes, ScoredPair, SimilarityConfig, SimilarityJob};

pub use analysis::Analysis;

pub use config::{AnalysisConfig, ConfigError};

pub use distributor::{
    CancelToken, DistributorConfig, DistributorError, Job, RunSummary, WorkDistributor,
};

pub use error::{Error, Result, Stage};

pub use persistence::{
    Checkpoint, CheckpointError, EgoSink, FileCheckpoint, MemoryCheckpoint, ResultSink,
    SimilaritySink,
};

pub use tables::{combine_raw_edges, CombineSummary, LoadError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
