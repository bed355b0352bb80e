//! JSON export of similarity results
//!
//! Turns `similarity_results.csv` into the two files the web front end reads:
//!
//! - `similarities.json`: `[{"id": 1, "list": [{"n": 4, "s": 1.23}]}]`,
//!   one entry per source node in first-seen order
//! - `nodes.json`: `[{"id": 1, "label": "Kevin Sprong"}]` for those sources
//!
//! Result rows are written by label, so labels are mapped back to node ids
//! through the graph store. Rows repeated by a resumed run are collapsed.

use crate::graph::{GraphStore, NodeId};
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const SIMILARITIES_JSON: &str = "similarities.json";
pub const NODES_JSON: &str = "nodes.json";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{line}: {message}", .path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}:{line}: no pair of known labels in '{text}'", .path.display())]
    UnknownLabel {
        path: PathBuf,
        line: usize,
        text: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// One row of a similarity results file, resolved to node ids
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityRow {
    pub source: NodeId,
    pub target: NodeId,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub n: NodeId,
    pub s: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEntry {
    pub id: NodeId,
    pub list: Vec<Neighbor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: NodeId,
    pub label: String,
}

/// Split `label_a,label_b` at the first comma where both halves are known
/// labels. Labels may themselves contain commas.
fn split_pair(text: &str, labels: &FxHashMap<&str, NodeId>) -> Option<(NodeId, NodeId)> {
    text.match_indices(',').find_map(|(pos, _)| {
        let a = labels.get(&text[..pos])?;
        let b = labels.get(&text[pos + 1..])?;
        Some((*a, *b))
    })
}

/// Parse `label_a,label_b,score` rows. Exact duplicate pairs keep their
/// first score.
pub fn parse_similarity_results<R: BufRead>(
    reader: R,
    path: &Path,
    store: &GraphStore,
) -> ExportResult<Vec<SimilarityRow>> {
    let labels = store.label_index();
    let mut rows: IndexMap<(NodeId, NodeId), f64> = IndexMap::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(io_error(path))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let line_no = idx + 1;

        let (pair, score) = trimmed.rsplit_once(',').ok_or_else(|| ExportError::Malformed {
            path: path.to_path_buf(),
            line: line_no,
            message: "expected label_a,label_b,score".to_string(),
        })?;
        let score: f64 = score.trim().parse().map_err(|_| ExportError::Malformed {
            path: path.to_path_buf(),
            line: line_no,
            message: format!("invalid score '{}'", score),
        })?;
        let key = split_pair(pair, &labels).ok_or_else(|| ExportError::UnknownLabel {
            path: path.to_path_buf(),
            line: line_no,
            text: pair.to_string(),
        })?;
        rows.entry(key).or_insert(score);
    }

    Ok(rows
        .into_iter()
        .map(|((source, target), score)| SimilarityRow { source, target, score })
        .collect())
}

/// Group rows by source node, in first-seen order
pub fn group_results(store: &GraphStore, rows: &[SimilarityRow]) -> (Vec<SimilarityEntry>, Vec<NodeEntry>) {
    let mut grouped: IndexMap<NodeId, Vec<Neighbor>> = IndexMap::new();
    for row in rows {
        grouped.entry(row.source).or_default().push(Neighbor {
            n: row.target,
            s: row.score,
        });
    }

    let nodes = grouped
        .keys()
        .map(|&id| NodeEntry {
            id,
            label: store
                .label(id)
                .map(|l| l.to_string())
                .unwrap_or_default(),
        })
        .collect();
    let entries = grouped
        .into_iter()
        .map(|(id, list)| SimilarityEntry { id, list })
        .collect();
    (entries, nodes)
}

/// The `n` highest-scoring pairs, counting `(a, b)` and `(b, a)` once.
/// Ties keep file order.
pub fn top_pairs(rows: &[SimilarityRow], n: usize) -> Vec<SimilarityRow> {
    let mut seen = IndexSet::new();
    let mut unique: Vec<SimilarityRow> = rows
        .iter()
        .filter(|row| seen.insert((row.source.min(row.target), row.source.max(row.target))))
        .copied()
        .collect();
    unique.sort_by(|a, b| b.score.total_cmp(&a.score));
    unique.truncate(n);
    unique
}

/// Load a similarity results file
pub fn load_similarity_results(path: &Path, store: &GraphStore) -> ExportResult<Vec<SimilarityRow>> {
    let file = File::open(path).map_err(io_error(path))?;
    parse_similarity_results(BufReader::new(file), path, store)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> ExportResult<()> {
    let file = File::create(path).map_err(io_error(path))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer(&mut out, value)?;
    writeln!(out).map_err(io_error(path))?;
    out.flush().map_err(io_error(path))
}

/// Outcome of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub sources: usize,
    pub pairs: usize,
}

/// Write `similarities.json` and `nodes.json` into `out_dir`
pub fn export_json(store: &GraphStore, results: &Path, out_dir: &Path) -> ExportResult<ExportSummary> {
    let rows = load_similarity_results(results, store)?;
    let (entries, nodes) = group_results(store, &rows);

    std::fs::create_dir_all(out_dir).map_err(io_error(out_dir))?;
    write_json(&out_dir.join(SIMILARITIES_JSON), &entries)?;
    write_json(&out_dir.join(NODES_JSON), &nodes)?;

    info!(
        "Exported {} pairs for {} source nodes to {}",
        rows.len(),
        entries.len(),
        out_dir.display()
    );
    Ok(ExportSummary {
        sources: entries.len(),
        pairs: rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BuildOptions, EdgeRecord, NodeRecord};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn store() -> GraphStore {
        let nodes = vec![
            NodeRecord::new(1, "Ann"),
            NodeRecord::new(2, "Doe, Jane"),
            NodeRecord::new(3, "Cy"),
        ];
        GraphStore::build(nodes, vec![EdgeRecord::new(1, 3, 1)], BuildOptions::default()).unwrap()
    }

    fn path() -> &'static Path {
        Path::new("similarity_results.csv")
    }

    #[test]
    fn test_parse_rows_with_comma_labels() {
        let store = store();
        let data = "Ann,Doe, Jane,0.67\nDoe, Jane,Ann,0.67\n\nAnn,Doe, Jane,0.67\n";
        let rows = parse_similarity_results(Cursor::new(data), path(), &store).unwrap();
        assert_eq!(
            rows,
            vec![
                SimilarityRow { source: 1, target: 2, score: 0.67 },
                SimilarityRow { source: 2, target: 1, score: 0.67 },
            ]
        );
    }

    #[test]
    fn test_parse_errors() {
        let store = store();
        let err = parse_similarity_results(Cursor::new("Ann,Bob,0.5\n"), path(), &store).unwrap_err();
        assert!(matches!(err, ExportError::UnknownLabel { line: 1, .. }));

        let err = parse_similarity_results(Cursor::new("Ann,Cy,high\n"), path(), &store).unwrap_err();
        assert_eq!(err.to_string(), "similarity_results.csv:1: invalid score 'high'");
    }

    #[test]
    fn test_group_and_top_pairs() {
        let store = store();
        let rows = vec![
            SimilarityRow { source: 1, target: 2, score: 0.5 },
            SimilarityRow { source: 3, target: 2, score: 0.9 },
            SimilarityRow { source: 2, target: 1, score: 0.5 },
        ];

        let (entries, nodes) = group_results(&store, &rows);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].id, 1);
        assert_eq!(entries[0].list, vec![Neighbor { n: 2, s: 0.5 }]);
        assert_eq!(nodes[1], NodeEntry { id: 3, label: "Cy".to_string() });

        let top = top_pairs(&rows, 5);
        assert_eq!(top.len(), 2);
        assert_eq!((top[0].source, top[0].target), (3, 2));
        assert_eq!((top[1].source, top[1].target), (1, 2));
    }

    #[test]
    fn test_export_json_files() {
        let store = store();
        let dir = TempDir::new().unwrap();
        let results = dir.path().join("similarity_results.csv");
        std::fs::write(&results, "Ann,Doe, Jane,1.25\n").unwrap();

        let out = dir.path().join("app");
        let summary = export_json(&store, &results, &out).unwrap();
        assert_eq!(summary, ExportSummary { sources: 1, pairs: 1 });

        let sims: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join(SIMILARITIES_JSON)).unwrap()).unwrap();
        assert_eq!(sims, serde_json::json!([{"id": 1, "list": [{"n": 2, "s": 1.25}]}]));

        let nodes: Vec<NodeEntry> =
            serde_json::from_str(&std::fs::read_to_string(out.join(NODES_JSON)).unwrap()).unwrap();
        assert_eq!(nodes, vec![NodeEntry { id: 1, label: "Ann".to_string() }]);
    }
}
