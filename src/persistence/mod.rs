//! Persistence layer
//!
//! - Checkpoint log of processed node ids (resume support)
//! - Append-mode result sinks for similarity and ego output

pub mod checkpoint;
pub mod sink;

pub use checkpoint::{Checkpoint, CheckpointError, CheckpointResult, FileCheckpoint, MemoryCheckpoint};
pub use sink::{round_to, EgoSink, MemorySink, ResultSink, SimilaritySink};
