//! Node similarity over adjacency rows
//!
//! Scores pairs of nodes by weighted Jaccard plus cosine similarity of their
//! adjacency rows and keeps the top K pairs that are not already connected.

use super::common::{id_of, AdjacencyView, NodeId, Row};
use rustc_hash::FxHashSet;

/// A candidate edge between two unconnected nodes
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoredPair {
    pub source: NodeId,
    pub target: NodeId,
    pub score: f64,
}

/// Similarity search configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimilarityConfig {
    /// Number of pairs to keep per source node
    pub top_k: usize,
    /// Minimum weighted degree for a source node to be searched
    pub degree_threshold: u64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            degree_threshold: 1,
        }
    }
}

/// Raw sums gathered in a single pass over two rows
#[derive(Debug, Default, Clone, Copy)]
struct PairSums {
    min_sum: u64,
    max_sum: u64,
    dot: f64,
    sq_a: f64,
    sq_b: f64,
}

impl PairSums {
    fn jaccard(&self) -> f64 {
        self.min_sum as f64 / self.max_sum.max(1) as f64
    }

    fn cosine(&self) -> f64 {
        let norm_a = self.sq_a.sqrt().max(1.0);
        let norm_b = self.sq_b.sqrt().max(1.0);
        self.dot / (norm_a * norm_b)
    }
}

fn pair_sums(a: Row<'_>, b: Row<'_>) -> PairSums {
    let mut sums = PairSums::default();

    if let (Row::Dense(ra), Row::Dense(rb)) = (a, b) {
        for (&x, &y) in ra.iter().zip(rb.iter()) {
            sums.min_sum += x.min(y) as u64;
            sums.max_sum += x.max(y) as u64;
            let (x, y) = (x as f64, y as f64);
            sums.dot += x * y;
            sums.sq_a += x * x;
            sums.sq_b += y * y;
        }
        return sums;
    }

    // Merge-join on the positive entries. Positions where only one side is
    // positive contribute to the max sum and that side's norm.
    let mut it_a = a.nonzero().peekable();
    let mut it_b = b.nonzero().peekable();
    loop {
        match (it_a.peek().copied(), it_b.peek().copied()) {
            (Some((ia, wa)), Some((ib, wb))) if ia == ib => {
                sums.min_sum += wa.min(wb) as u64;
                sums.max_sum += wa.max(wb) as u64;
                sums.dot += wa as f64 * wb as f64;
                sums.sq_a += wa as f64 * wa as f64;
                sums.sq_b += wb as f64 * wb as f64;
                it_a.next();
                it_b.next();
            }
            (Some((ia, wa)), Some((ib, _))) if ia < ib => {
                sums.max_sum += wa as u64;
                sums.sq_a += wa as f64 * wa as f64;
                it_a.next();
            }
            (_, Some((_, wb))) => {
                sums.max_sum += wb as u64;
                sums.sq_b += wb as f64 * wb as f64;
                it_b.next();
            }
            (Some((_, wa)), None) => {
                sums.max_sum += wa as u64;
                sums.sq_a += wa as f64 * wa as f64;
                it_a.next();
            }
            (None, None) => break,
        }
    }
    sums
}

/// Weighted Jaccard similarity: `sum(min) / max(1, sum(max))`
pub fn jaccard(a: Row<'_>, b: Row<'_>) -> f64 {
    pair_sums(a, b).jaccard()
}

/// Cosine similarity with each norm floored at 1
pub fn cosine(a: Row<'_>, b: Row<'_>) -> f64 {
    pair_sums(a, b).cosine()
}

/// `jaccard + cosine`. Not normalized: the result lies in `[0, 2]`.
pub fn combined_score(a: Row<'_>, b: Row<'_>) -> f64 {
    let sums = pair_sums(a, b);
    sums.jaccard() + sums.cosine()
}

/// Bounded result set, sorted descending by score.
///
/// Equal scores keep insertion order. Once full, a new pair is accepted when
/// its score is at least the current K-th best, which evicts the last entry.
#[derive(Debug, Clone)]
pub struct TopK {
    capacity: usize,
    entries: Vec<ScoredPair>,
}

impl TopK {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Lowest score that would still be accepted
    pub fn threshold(&self) -> f64 {
        if self.entries.len() < self.capacity {
            f64::NEG_INFINITY
        } else {
            self.entries.last().map_or(f64::INFINITY, |e| e.score)
        }
    }

    /// Offer a pair; returns whether it was kept
    pub fn offer(&mut self, pair: ScoredPair) -> bool {
        if self.capacity == 0 || pair.score < self.threshold() {
            return false;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop();
        }
        let pos = self.entries.partition_point(|e| e.score >= pair.score);
        self.entries.insert(pos, pair);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[ScoredPair] {
        &self.entries
    }

    pub fn into_vec(self) -> Vec<ScoredPair> {
        self.entries
    }
}

/// Find the `top_k` most similar candidates not connected to `source`.
///
/// Returns an empty list when the source's weighted degree is below the
/// threshold. Self and already-connected candidates are skipped, and a
/// candidate listed twice is scored once.
pub fn find_top_k<V: AdjacencyView + ?Sized>(
    view: &V,
    source: usize,
    candidates: &[usize],
    config: &SimilarityConfig,
) -> Vec<ScoredPair> {
    if config.top_k == 0 || view.degree(source) < config.degree_threshold {
        return Vec::new();
    }

    let source_row = view.row(source);
    let source_id = id_of(source);
    let mut best = TopK::new(config.top_k);
    let mut seen = FxHashSet::default();

    for &candidate in candidates {
        // only want unconnected nodes
        if candidate == source || source_row.get(candidate) > 0 || !seen.insert(candidate) {
            continue;
        }

        let score = combined_score(source_row, view.row(candidate));
        best.offer(ScoredPair {
            source: source_id,
            target: id_of(candidate),
            score,
        });
    }

    best.into_vec()
}
