use super::*;
use crate::graph::{BuildOptions, EdgeRecord, NodeRecord};
use crate::persistence::{MemoryCheckpoint, MemorySink};
use std::sync::atomic::AtomicUsize;
use std::sync::{Condvar, Mutex};

/// Path 1-2-3-4 plus isolated node 5
fn store() -> Arc<GraphStore> {
    let nodes = (1..=5).map(|i| NodeRecord::new(i, format!("n{}", i))).collect();
    let edges = vec![
        EdgeRecord::new(1, 2, 1),
        EdgeRecord::new(2, 3, 1),
        EdgeRecord::new(3, 4, 1),
    ];
    Arc::new(GraphStore::build(nodes, edges, BuildOptions::default()).unwrap())
}

fn distributor(workers: usize) -> WorkDistributor {
    WorkDistributor::new(DistributorConfig {
        workers,
        poll_interval: Duration::from_millis(10),
        ..Default::default()
    })
    .unwrap()
}

/// Emits `(node, degree)`; isolated nodes give an empty result
struct DegreeJob;

impl Job for DegreeJob {
    type Output = (NodeId, u64);

    fn name(&self) -> &'static str {
        "degree"
    }

    fn compute(&self, store: &GraphStore, node: NodeId) -> Self::Output {
        (node, store.degree(node).unwrap_or(0))
    }

    fn is_empty(&self, output: &Self::Output) -> bool {
        output.1 == 0
    }
}

/// Panics on one node
struct PanicJob(NodeId);

impl Job for PanicJob {
    type Output = NodeId;

    fn name(&self) -> &'static str {
        "panic"
    }

    fn compute(&self, _store: &GraphStore, node: NodeId) -> NodeId {
        if node == self.0 {
            panic!("bad node {}", node);
        }
        node
    }

    fn is_empty(&self, _output: &NodeId) -> bool {
        false
    }
}

/// Closed until `open` is called; waiters block on it
#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.changed.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.changed.wait(open).unwrap();
        }
    }
}

/// Blocks on one node for the first `stalls` attempts. The attempt after
/// the last stall opens the gate, releasing the stalled ones.
struct StallJob {
    node: NodeId,
    stalls: usize,
    calls: AtomicUsize,
    gate: Arc<Gate>,
}

impl StallJob {
    fn new(node: NodeId, stalls: usize) -> Self {
        Self {
            node,
            stalls,
            calls: AtomicUsize::new(0),
            gate: Arc::new(Gate::default()),
        }
    }
}

impl Job for StallJob {
    type Output = NodeId;

    fn name(&self) -> &'static str {
        "stall"
    }

    fn compute(&self, _store: &GraphStore, node: NodeId) -> NodeId {
        if node == self.node {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.stalls {
                self.gate.wait();
            } else {
                self.gate.open();
            }
        }
        node
    }

    fn is_empty(&self, _output: &NodeId) -> bool {
        false
    }
}

/// Cancels the run while computing its `after`-th node
struct CancelAfterJob {
    after: usize,
    calls: AtomicUsize,
    cancel: CancelToken,
}

impl Job for CancelAfterJob {
    type Output = NodeId;

    fn name(&self) -> &'static str {
        "cancel-after"
    }

    fn compute(&self, _store: &GraphStore, node: NodeId) -> NodeId {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            self.cancel.cancel();
        }
        node
    }

    fn is_empty(&self, _output: &NodeId) -> bool {
        false
    }
}

fn sorted(mut ids: Vec<NodeId>) -> Vec<NodeId> {
    ids.sort_unstable();
    ids
}

#[test]
fn test_chunk_size() {
    assert_eq!(chunk_size(100, 5), 10);
    assert_eq!(chunk_size(3, 4), 1);
    assert_eq!(chunk_size(0, 4), 1);
    assert_eq!(chunk_size(10, 0), 5);
}

#[test]
fn test_config_validation() {
    assert!(WorkDistributor::new(DistributorConfig { workers: 0, ..Default::default() }).is_err());
    assert!(WorkDistributor::new(DistributorConfig { channel_capacity: 0, ..Default::default() }).is_err());
    assert!(DistributorConfig { max_attempts: 0, ..Default::default() }.validate().is_err());
    assert!(DistributorConfig {
        chunk_timeout: Some(Duration::ZERO),
        ..Default::default()
    }
    .validate()
    .is_err());
    assert!(default_workers() >= 1);
}

#[test]
fn test_full_run() {
    let mut checkpoint = MemoryCheckpoint::new();
    let mut sink = MemorySink::default();
    let summary = distributor(2)
        .run(Arc::new(DegreeJob), store(), &[1, 2, 3, 4, 5], &mut checkpoint, &mut sink, &CancelToken::new())
        .unwrap();

    assert_eq!(summary.submitted, 5);
    assert_eq!(summary.written, 4);
    assert_eq!(summary.empty, 1);
    assert!(summary.is_complete());

    // Isolated node is checkpointed but not written
    assert_eq!(sorted(checkpoint.log().to_vec()), vec![1, 2, 3, 4, 5]);
    let mut results = sink.results.clone();
    results.sort_unstable();
    assert_eq!(results, vec![(1, 1), (2, 2), (3, 2), (4, 1)]);
}

#[test]
fn test_resume_computes_exact_complement() {
    let mut checkpoint = MemoryCheckpoint::with_ids([1, 3]);
    let mut sink = MemorySink::default();
    let summary = distributor(3)
        .run(Arc::new(DegreeJob), store(), &[1, 2, 3, 4], &mut checkpoint, &mut sink, &CancelToken::new())
        .unwrap();

    assert_eq!(summary.already_done, 2);
    assert_eq!(summary.submitted, 2);
    let computed = sorted(sink.results.iter().map(|r| r.0).collect());
    assert_eq!(computed, vec![2, 4]);
    assert_eq!(checkpoint.log()[..2], [1, 3]);
    assert_eq!(sorted(checkpoint.log().to_vec()), vec![1, 2, 3, 4]);

    // A second pass has nothing left to do
    let again = distributor(3)
        .run(Arc::new(DegreeJob), store(), &[1, 2, 3, 4], &mut checkpoint, &mut sink, &CancelToken::new())
        .unwrap();
    assert_eq!(again.submitted, 0);
    assert_eq!(again.already_done, 4);
    assert_eq!(checkpoint.len(), 4);
    assert_eq!(sink.results.len(), 2);
}

#[test]
fn test_duplicate_input_ids() {
    let mut checkpoint = MemoryCheckpoint::new();
    let mut sink = MemorySink::default();
    let summary = distributor(2)
        .run(Arc::new(DegreeJob), store(), &[2, 2, 3, 2], &mut checkpoint, &mut sink, &CancelToken::new())
        .unwrap();
    assert_eq!(summary.submitted, 2);
    assert_eq!(checkpoint.log().len(), 2);
}

#[test]
fn test_panic_fails_only_that_node() {
    let mut checkpoint = MemoryCheckpoint::new();
    let mut sink = MemorySink::default();
    // One worker, so all ids of a chunk run on the thread that panicked
    let summary = distributor(1)
        .run(Arc::new(PanicJob(3)), store(), &[1, 2, 3, 4, 5], &mut checkpoint, &mut sink, &CancelToken::new())
        .unwrap();

    assert_eq!(summary.failed, vec![3]);
    assert_eq!(summary.written, 4);
    assert!(!summary.is_complete());
    assert!(!checkpoint.contains(3));
    assert_eq!(sorted(sink.results.clone()), vec![1, 2, 4, 5]);
}

#[test]
fn test_cancelled_before_start() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut checkpoint = MemoryCheckpoint::new();
    let mut sink = MemorySink::default();
    let summary = distributor(2)
        .run(Arc::new(DegreeJob), store(), &[1, 2, 3], &mut checkpoint, &mut sink, &cancel)
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.processed(), 0);
    assert!(checkpoint.is_empty());
}

#[test]
fn test_cancel_mid_run_then_resume() {
    let ids: Vec<NodeId> = (1..=5).collect();
    let mut checkpoint = MemoryCheckpoint::new();

    let cancel = CancelToken::new();
    let job = Arc::new(CancelAfterJob {
        after: 2,
        calls: AtomicUsize::new(0),
        cancel: cancel.clone(),
    });
    let mut first = MemorySink::default();
    let summary = distributor(1)
        .run(job, store(), &ids, &mut checkpoint, &mut first, &cancel)
        .unwrap();

    assert!(summary.cancelled);
    assert!(!summary.is_complete());
    assert!(checkpoint.len() < ids.len());
    let done_first = sorted(checkpoint.log().to_vec());
    assert_eq!(sorted(first.results.clone()), done_first);

    // Restart with a fresh token: only the unfinished ids run
    let job = Arc::new(CancelAfterJob {
        after: usize::MAX,
        calls: AtomicUsize::new(0),
        cancel: CancelToken::new(),
    });
    let mut second = MemorySink::default();
    let summary = distributor(2)
        .run(job, store(), &ids, &mut checkpoint, &mut second, &CancelToken::new())
        .unwrap();

    assert!(summary.is_complete());
    assert_eq!(summary.already_done, done_first.len());
    let complement: Vec<NodeId> = ids.iter().copied().filter(|id| !done_first.contains(id)).collect();
    assert_eq!(sorted(second.results.clone()), complement);

    // Every id exactly once across both runs
    assert_eq!(sorted(checkpoint.log().to_vec()), ids);
}

#[test]
fn test_stalled_chunk_is_requeued() {
    let distributor = WorkDistributor::new(DistributorConfig {
        workers: 2,
        chunk_timeout: Some(Duration::from_millis(200)),
        max_attempts: 3,
        poll_interval: Duration::from_millis(10),
        ..Default::default()
    })
    .unwrap();
    // The first attempt on node 1 holds until the retry releases it
    let job = Arc::new(StallJob::new(1, 1));
    let mut checkpoint = MemoryCheckpoint::new();
    let mut sink = MemorySink::default();
    let summary = distributor
        .run(job, store(), &[1, 2, 3, 4], &mut checkpoint, &mut sink, &CancelToken::new())
        .unwrap();

    assert!(summary.is_complete());
    assert_eq!(summary.written, 4);
    // Written exactly once even though node 1 was computed twice
    assert_eq!(sorted(sink.results.clone()), vec![1, 2, 3, 4]);
    assert_eq!(checkpoint.len(), 4);
}

#[test]
fn test_chunk_abandoned_after_max_attempts() {
    let distributor = WorkDistributor::new(DistributorConfig {
        workers: 2,
        chunk_timeout: Some(Duration::from_millis(200)),
        max_attempts: 2,
        poll_interval: Duration::from_millis(10),
        ..Default::default()
    })
    .unwrap();
    let job = Arc::new(StallJob::new(1, usize::MAX));
    let gate = job.gate.clone();
    let mut checkpoint = MemoryCheckpoint::new();
    let mut sink = MemorySink::default();
    let summary = distributor
        .run(job, store(), &[1, 2, 3, 4], &mut checkpoint, &mut sink, &CancelToken::new())
        .unwrap();
    // Release the workers still holding node 1
    gate.open();

    assert_eq!(summary.abandoned, vec![1]);
    assert_eq!(summary.written, 3);
    assert!(!checkpoint.contains(1));
}
