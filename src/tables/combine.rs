//! Collapse raw co-occurrence edges into a weighted edge table
//!
//! The roster scraper writes one `source,target,label` row per pair of
//! players that shared a team in a season. Collapsing counts every unordered
//! pair and writes `source,target,label,weight,type` rows in first-seen
//! order. A raw file without a `label` column gives a table without one.

use super::loader::{parse_labelled_edges, LabelledEdge};
use super::{open, LoadError, LoadResult};
use crate::graph::{EdgeRecord, NodeId, Weight};
use indexmap::IndexMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Outcome of a combine run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombineSummary {
    /// Raw rows read
    pub observations: usize,
    /// Weighted edges written
    pub edges: usize,
}

/// Count observations per unordered pair, keeping first-seen order and the
/// first label seen for each pair
pub fn collapse(raw: impl IntoIterator<Item = LabelledEdge>) -> Vec<LabelledEdge> {
    let mut counts: IndexMap<(NodeId, NodeId), (Weight, Option<String>)> = IndexMap::new();
    for LabelledEdge { edge, label } in raw {
        let (w, first) = counts.entry(edge.key()).or_insert((0, None));
        *w = w.saturating_add(edge.weight);
        if first.is_none() {
            *first = label;
        }
    }
    counts
        .into_iter()
        .map(|((a, b), (w, label))| LabelledEdge {
            edge: EdgeRecord::new(a, b, w),
            label,
        })
        .collect()
}

/// Write a weighted edge table, with a `label` column when `labelled`.
///
/// Commas are dropped from labels so the columns stay aligned.
pub fn write_edges<W: Write>(mut out: W, edges: &[LabelledEdge], labelled: bool) -> std::io::Result<()> {
    if labelled {
        writeln!(out, "source,target,label,weight,type")?;
    } else {
        writeln!(out, "source,target,weight,type")?;
    }
    for LabelledEdge { edge, label } in edges {
        if labelled {
            let label = label.as_deref().unwrap_or_default().replace(',', "");
            writeln!(out, "{},{},{},{},undirected", edge.source, edge.target, label, edge.weight)?;
        } else {
            writeln!(out, "{},{},{},undirected", edge.source, edge.target, edge.weight)?;
        }
    }
    out.flush()
}

/// Read a raw edge file and write the collapsed, weighted table to `output`
pub fn combine_raw_edges(input: &Path, output: &Path) -> LoadResult<CombineSummary> {
    let raw = parse_labelled_edges(open(input)?, input)?;
    let observations = raw.len();
    let labelled = raw.iter().any(|e| e.label.is_some());
    let edges = collapse(raw);

    let file = File::create(output).map_err(|e| LoadError::io(output, e))?;
    write_edges(BufWriter::new(file), &edges, labelled).map_err(|e| LoadError::io(output, e))?;

    info!(
        "Combined {} raw edge rows into {} weighted edges ({})",
        observations,
        edges.len(),
        output.display()
    );

    Ok(CombineSummary {
        observations,
        edges: edges.len(),
    })
}
