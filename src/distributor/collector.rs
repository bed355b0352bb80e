//! The single consumer of worker results

use super::{ChunkContext, DistributorError, DistributorResult, Job, RunSummary, WorkDistributor, WorkerMessage};
use crate::graph::NodeId;
use crate::persistence::{Checkpoint, ResultSink};
use rustc_hash::{FxHashMap, FxHashSet};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Bookkeeping for one chunk of ids
pub(crate) struct ChunkState {
    /// Ids in submission order
    ids: Vec<NodeId>,
    /// Ids with no result yet
    remaining: FxHashSet<NodeId>,
    /// Set when a worker starts the chunk, pushed back on every result
    deadline: Option<Instant>,
    attempts: usize,
}

impl ChunkState {
    pub(crate) fn new(ids: Vec<NodeId>) -> Self {
        let remaining = ids.iter().copied().collect();
        Self {
            ids,
            remaining,
            deadline: None,
            attempts: 1,
        }
    }

    fn leftover(&self) -> Vec<NodeId> {
        self.ids
            .iter()
            .copied()
            .filter(|id| self.remaining.contains(id))
            .collect()
    }
}

pub(crate) struct Collector<'a, J: Job, S: ?Sized, C: ?Sized> {
    distributor: &'a WorkDistributor,
    context: ChunkContext<J>,
    chunks: FxHashMap<usize, ChunkState>,
    /// Ids settled in this run; later results for them are duplicates
    settled: FxHashSet<NodeId>,
    checkpoint: &'a mut C,
    sink: &'a mut S,
    summary: RunSummary,
    progress_step: usize,
}

impl<'a, J, S, C> Collector<'a, J, S, C>
where
    J: Job,
    S: ResultSink<J::Output> + ?Sized,
    C: Checkpoint + ?Sized,
{
    pub(crate) fn new(
        distributor: &'a WorkDistributor,
        context: ChunkContext<J>,
        chunks: FxHashMap<usize, ChunkState>,
        checkpoint: &'a mut C,
        sink: &'a mut S,
        summary: RunSummary,
    ) -> Self {
        let progress_step = (summary.submitted / 10).max(1);
        Self {
            distributor,
            context,
            chunks,
            settled: FxHashSet::default(),
            checkpoint,
            sink,
            summary,
            progress_step,
        }
    }

    /// Consume worker messages until no chunk is pending or the run is cancelled
    pub(crate) async fn drive(&mut self, rx: &mut mpsc::Receiver<WorkerMessage<J::Output>>) -> DistributorResult<()> {
        while !self.chunks.is_empty() {
            if self.context.cancel.is_cancelled() {
                warn!("{}: cancelled with {} chunks pending", self.context.job.name(), self.chunks.len());
                self.summary.cancelled = true;
                break;
            }
            self.requeue_stalled();
            if self.chunks.is_empty() {
                break;
            }

            match tokio::time::timeout(self.next_wakeup(), rx.recv()).await {
                Ok(Some(message)) => self.handle(message)?,
                // The collector holds a sender, so the channel never closes here
                Ok(None) => break,
                Err(_) => trace!("Collector idle, {} chunks pending", self.chunks.len()),
            }
        }
        Ok(())
    }

    /// Flush both files and hand back the summary
    pub(crate) fn finish(&mut self) -> DistributorResult<RunSummary> {
        self.sink.flush().map_err(DistributorError::Flush)?;
        self.checkpoint.flush().map_err(DistributorError::CheckpointFlush)?;
        Ok(std::mem::take(&mut self.summary))
    }

    fn next_wakeup(&self) -> Duration {
        let poll = self.distributor.config().poll_interval;
        let now = Instant::now();
        self.chunks
            .values()
            .filter_map(|c| c.deadline)
            .min()
            .map_or(poll, |deadline| deadline.saturating_duration_since(now).min(poll))
    }

    fn handle(&mut self, message: WorkerMessage<J::Output>) -> DistributorResult<()> {
        match message {
            WorkerMessage::Started { chunk } => {
                if let Some(state) = self.chunks.get_mut(&chunk) {
                    state.deadline = self.distributor.config().chunk_timeout.map(|t| Instant::now() + t);
                }
            }
            WorkerMessage::Done { chunk, node, output } => {
                if !self.settled.insert(node) {
                    trace!("Discarding late result for node {}", node);
                    return Ok(());
                }
                self.advance(chunk, node);

                if self.context.job.is_empty(&output) {
                    self.summary.empty += 1;
                } else {
                    self.sink
                        .write(&self.context.store, &output)
                        .and_then(|_| self.sink.flush())
                        .map_err(|source| DistributorError::Output { node, source })?;
                    self.summary.written += 1;
                }
                self.checkpoint
                    .add(node)
                    .map_err(|source| DistributorError::Checkpoint { node, source })?;
                self.report_progress();
            }
            WorkerMessage::Failed { chunk, node, reason } => {
                if !self.settled.insert(node) {
                    return Ok(());
                }
                warn!("{} failed for node {}: {}", self.context.job.name(), node, reason);
                self.advance(chunk, node);
                self.summary.failed.push(node);
            }
        }
        Ok(())
    }

    fn advance(&mut self, chunk: usize, node: NodeId) {
        let timeout = self.distributor.config().chunk_timeout;
        let Some(state) = self.chunks.get_mut(&chunk) else {
            return;
        };
        state.remaining.remove(&node);
        if state.remaining.is_empty() {
            debug!("Chunk {} finished", chunk);
            self.chunks.remove(&chunk);
        } else if let Some(timeout) = timeout {
            state.deadline = Some(Instant::now() + timeout);
        }
    }

    fn report_progress(&self) {
        let done = self.summary.processed();
        if done % self.progress_step == 0 || done == self.summary.submitted {
            info!(
                "{}: {}/{} nodes processed",
                self.context.job.name(),
                done,
                self.summary.submitted
            );
        }
    }

    /// Requeue started chunks whose deadline passed; abandon those out of attempts
    fn requeue_stalled(&mut self) {
        let Some(timeout) = self.distributor.config().chunk_timeout else {
            return;
        };
        let max_attempts = self.distributor.config().max_attempts;
        let now = Instant::now();

        let mut stalled: Vec<usize> = self
            .chunks
            .iter()
            .filter(|(_, state)| state.deadline.is_some_and(|d| d <= now))
            .map(|(&chunk, _)| chunk)
            .collect();
        stalled.sort_unstable();

        for chunk in stalled {
            let Some(state) = self.chunks.get_mut(&chunk) else {
                continue;
            };
            let leftover = state.leftover();

            if state.attempts >= max_attempts {
                warn!(
                    "Abandoning chunk {} after {} attempts, {} nodes unprocessed",
                    chunk,
                    state.attempts,
                    leftover.len()
                );
                self.chunks.remove(&chunk);
                self.settled.extend(leftover.iter().copied());
                self.summary.abandoned.extend(leftover);
            } else {
                state.attempts += 1;
                // Refreshed again once a worker picks the new task up
                state.deadline = Some(now + timeout);
                warn!(
                    "Chunk {} stalled for {:?}, requeueing {} nodes (attempt {}/{})",
                    chunk,
                    timeout,
                    leftover.len(),
                    state.attempts,
                    max_attempts
                );
                self.distributor.spawn_chunk(chunk, leftover, &self.context);
            }
        }
    }
}
