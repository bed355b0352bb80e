//! Work distributor
//!
//! Fans node ids out over a fixed rayon worker pool and funnels results back
//! through a bounded channel to a single collector, the only place that
//! touches the output file and the checkpoint log.
//!
//! - Ids already in the checkpoint are skipped
//! - Ids are split into contiguous chunks of `len / (2 * workers)` (at least 1)
//! - Results are written in completion order; the id is checkpointed only
//!   after its result has been written and flushed
//! - A panicking computation fails that id only, the rest of its chunk goes on
//! - Optionally, a chunk with no progress for `chunk_timeout` is requeued

mod collector;

use crate::graph::{GraphStore, NodeId};
use crate::persistence::{Checkpoint, CheckpointError, ResultSink};
use collector::{ChunkState, Collector};
use rustc_hash::{FxHashMap, FxHashSet};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Distributor errors. Any of these aborts the run.
#[derive(Error, Debug)]
pub enum DistributorError {
    #[error("Invalid distributor configuration: {0}")]
    Config(String),

    #[error("Failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to start collector runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("Failed to write result for node {node}: {source}")]
    Output {
        node: NodeId,
        #[source]
        source: io::Error,
    },

    #[error("Failed to flush output: {0}")]
    Flush(#[source] io::Error),

    #[error("Failed to flush checkpoint: {0}")]
    CheckpointFlush(#[source] CheckpointError),

    #[error("Failed to record node {node} in checkpoint: {source}")]
    Checkpoint {
        node: NodeId,
        #[source]
        source: CheckpointError,
    },
}

pub type DistributorResult<T> = Result<T, DistributorError>;

/// A per-node computation run by the workers.
///
/// `compute` must be a pure function of the store and the node id.
pub trait Job: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn compute(&self, store: &GraphStore, node: NodeId) -> Self::Output;

    /// Empty outputs are checkpointed but not written
    fn is_empty(&self, output: &Self::Output) -> bool;
}

/// Default worker count: all cores but one, at least one
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .saturating_sub(1)
        .max(1)
}

/// Distributor configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributorConfig {
    /// Worker threads in the pool
    pub workers: usize,
    /// Capacity of the worker → collector channel
    pub channel_capacity: usize,
    /// Requeue a started chunk that makes no progress for this long
    pub chunk_timeout: Option<Duration>,
    /// Attempts per chunk (including the first) before it is abandoned
    pub max_attempts: usize,
    /// How often the collector wakes up to check cancellation and deadlines
    pub poll_interval: Duration,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            channel_capacity: 1024,
            chunk_timeout: None,
            max_attempts: 3,
            poll_interval: Duration::from_millis(200),
        }
    }
}

impl DistributorConfig {
    pub fn validate(&self) -> DistributorResult<()> {
        if self.workers == 0 {
            return Err(DistributorError::Config("workers must be at least 1".into()));
        }
        if self.channel_capacity == 0 {
            return Err(DistributorError::Config("channel capacity must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(DistributorError::Config("max attempts must be at least 1".into()));
        }
        if self.chunk_timeout == Some(Duration::ZERO) {
            return Err(DistributorError::Config("chunk timeout must be positive".into()));
        }
        Ok(())
    }
}

/// Cooperative cancellation flag shared by workers and the collector
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a distributor run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ids handed to workers (after checkpoint and duplicate filtering)
    pub submitted: usize,
    /// Ids skipped because the checkpoint already had them
    pub already_done: usize,
    /// Ids whose result was written
    pub written: usize,
    /// Ids with an empty result (checkpointed, nothing written)
    pub empty: usize,
    /// Ids whose computation panicked
    pub failed: Vec<NodeId>,
    /// Ids left over in chunks that exhausted their attempts
    pub abandoned: Vec<NodeId>,
    /// The run stopped early on cancellation
    pub cancelled: bool,
}

impl RunSummary {
    /// Ids recorded in the checkpoint during this run
    pub fn processed(&self) -> usize {
        self.written + self.empty
    }

    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed.is_empty() && self.abandoned.is_empty()
    }
}

/// Chunk size for `len` ids over `workers` workers
pub fn chunk_size(len: usize, workers: usize) -> usize {
    (len / (2 * workers.max(1))).max(1)
}

pub(crate) enum WorkerMessage<T> {
    /// A worker picked up the chunk
    Started { chunk: usize },
    Done { chunk: usize, node: NodeId, output: T },
    Failed { chunk: usize, node: NodeId, reason: String },
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Everything a chunk task needs, cloned into each spawned task
pub(crate) struct ChunkContext<J: Job> {
    pub(crate) job: Arc<J>,
    pub(crate) store: Arc<GraphStore>,
    pub(crate) tx: mpsc::Sender<WorkerMessage<J::Output>>,
    pub(crate) cancel: CancelToken,
}

/// Fixed-size worker pool running [`Job`]s over node ids
pub struct WorkDistributor {
    config: DistributorConfig,
    pool: rayon::ThreadPool,
}

impl WorkDistributor {
    pub fn new(config: DistributorConfig) -> DistributorResult<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("rostergraph-worker-{}", i))
            .build()?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &DistributorConfig {
        &self.config
    }

    /// Run `job` for every id in `ids` not already in `checkpoint`.
    ///
    /// Results are written to `sink` in completion order; each id is added to
    /// the checkpoint after its result is flushed. Returns once every chunk is
    /// finished or abandoned, or when `cancel` fires.
    pub fn run<J, S, C>(
        &self,
        job: Arc<J>,
        store: Arc<GraphStore>,
        ids: &[NodeId],
        checkpoint: &mut C,
        sink: &mut S,
        cancel: &CancelToken,
    ) -> DistributorResult<RunSummary>
    where
        J: Job,
        S: ResultSink<J::Output> + ?Sized,
        C: Checkpoint + ?Sized,
    {
        let mut seen = FxHashSet::default();
        let mut already_done = 0usize;
        let todo: Vec<NodeId> = ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .filter(|id| {
                let done = checkpoint.contains(*id);
                already_done += done as usize;
                !done
            })
            .collect();

        let name = job.name();
        info!(
            "{}: {} ids requested, {} already processed, {} to compute",
            name,
            ids.len(),
            already_done,
            todo.len()
        );

        let summary = RunSummary {
            submitted: todo.len(),
            already_done,
            ..Default::default()
        };
        if todo.is_empty() {
            return Ok(summary);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(DistributorError::Runtime)?;

        let (tx, mut rx) = mpsc::channel(self.config.channel_capacity);
        let context = ChunkContext {
            job,
            store,
            tx,
            cancel: cancel.clone(),
        };

        let size = chunk_size(todo.len(), self.config.workers);
        let mut chunks = FxHashMap::default();
        for (chunk, ids) in todo.chunks(size).enumerate() {
            chunks.insert(chunk, ChunkState::new(ids.to_vec()));
            self.spawn_chunk(chunk, ids.to_vec(), &context);
        }
        debug!(
            "Planned {} chunks of up to {} ids over {} workers",
            chunks.len(),
            size,
            self.config.workers
        );

        let mut collector = Collector::new(self, context, chunks, checkpoint, sink, summary);
        let outcome = runtime.block_on(collector.drive(&mut rx));
        let finish = collector.finish();
        outcome?;
        let summary = finish?;

        info!(
            "{}: {} written, {} empty, {} failed, {} abandoned{}",
            name,
            summary.written,
            summary.empty,
            summary.failed.len(),
            summary.abandoned.len(),
            if summary.cancelled { " (cancelled)" } else { "" }
        );
        Ok(summary)
    }

    /// Spawn one chunk on the pool. Workers stop early when the collector
    /// has gone away or the run was cancelled.
    pub(crate) fn spawn_chunk<J: Job>(&self, chunk: usize, ids: Vec<NodeId>, context: &ChunkContext<J>) {
        let job = Arc::clone(&context.job);
        let store = Arc::clone(&context.store);
        let tx = context.tx.clone();
        let cancel = context.cancel.clone();

        self.pool.spawn(move || {
            if tx.blocking_send(WorkerMessage::Started { chunk }).is_err() {
                return;
            }
            for node in ids {
                if cancel.is_cancelled() {
                    break;
                }
                let message = match panic::catch_unwind(AssertUnwindSafe(|| job.compute(&store, node))) {
                    Ok(output) => WorkerMessage::Done { chunk, node, output },
                    Err(payload) => WorkerMessage::Failed {
                        chunk,
                        node,
                        reason: panic_message(payload.as_ref()),
                    },
                };
                if tx.blocking_send(message).is_err() {
                    break;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests;
