//! Graph data model and storage
//!
//! - Node ids are dense over `1..=N` and map 1:1 to labels
//! - Edges are undirected and carry a positive co-occurrence weight
//! - The store is immutable once built

pub mod store;
pub mod types;

pub use store::{BuildOptions, GraphError, GraphResult, GraphStore};
pub use types::{EdgeRecord, Label, NodeId, NodeRecord, Weight};
pub use rostergraph_algorithms::StorageStrategy;
