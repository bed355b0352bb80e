//! Node, edge and candidate table readers

use super::{open, Delimiter, LoadError, LoadResult};
use crate::graph::{BuildOptions, EdgeRecord, GraphStore, NodeId, NodeRecord, Weight};
use indexmap::IndexSet;
use std::io::{BufRead, Lines};
use std::iter::Enumerate;
use std::path::Path;
use tracing::{debug, info};

/// Row reader over a delimited table with a header line
struct TableReader<'p, R> {
    path: &'p Path,
    lines: Enumerate<Lines<R>>,
    delimiter: Delimiter,
}

impl<'p, R: BufRead> TableReader<'p, R> {
    /// Consume the header and return it split into trimmed column names
    fn open(reader: R, path: &'p Path) -> LoadResult<(Self, Vec<String>)> {
        let mut table = TableReader {
            path,
            lines: reader.lines().enumerate(),
            delimiter: Delimiter::Comma,
        };
        let (_, header) = table.next_row()?.ok_or_else(|| LoadError::MissingHeader {
            path: path.to_path_buf(),
        })?;
        table.delimiter = Delimiter::detect(&header);
        let columns = table
            .split(&header)
            .into_iter()
            .map(|c| c.to_string())
            .collect();
        Ok((table, columns))
    }

    /// Next non-blank line with its 1-based line number
    fn next_row(&mut self) -> LoadResult<Option<(usize, String)>> {
        for (idx, line) in self.lines.by_ref() {
            let line = line.map_err(|e| LoadError::io(self.path, e))?;
            if !line.trim().is_empty() {
                return Ok(Some((idx + 1, line)));
            }
        }
        Ok(None)
    }

    fn split<'l>(&self, line: &'l str) -> Vec<&'l str> {
        line.split(self.delimiter.as_char()).map(str::trim).collect()
    }
}

fn parse_field<T: std::str::FromStr>(
    path: &Path,
    line: usize,
    field: Option<&str>,
    what: &str,
) -> LoadResult<T> {
    let raw = field.ok_or_else(|| LoadError::malformed(path, line, format!("missing {}", what)))?;
    raw.parse()
        .map_err(|_| LoadError::malformed(path, line, format!("invalid {} '{}'", what, raw)))
}

/// Parse a node table: header, then `id,label` rows.
///
/// Labels may contain the delimiter; everything after the first delimiter is
/// the label.
pub fn parse_nodes<R: BufRead>(reader: R, path: &Path) -> LoadResult<Vec<NodeRecord>> {
    let (mut table, _) = TableReader::open(reader, path)?;
    let delimiter = table.delimiter.as_char();
    let mut nodes = Vec::new();

    while let Some((line_no, line)) = table.next_row()? {
        let mut fields = line.splitn(2, delimiter);
        let id: NodeId = parse_field(path, line_no, fields.next().map(str::trim), "node id")?;
        let label = fields
            .next()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| LoadError::malformed(path, line_no, "missing label"))?;
        nodes.push(NodeRecord::new(id, label));
    }

    Ok(nodes)
}

/// Column positions in an edge table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EdgeColumns {
    source: usize,
    target: usize,
    /// `None` for raw co-occurrence tables: every row weighs 1
    weight: Option<usize>,
    /// Pair label such as `Ann Lee - Bo Park`, only located by name
    label: Option<usize>,
}

impl EdgeColumns {
    fn from_header(header: &[String]) -> Self {
        let find = |name: &str| header.iter().position(|h| h.eq_ignore_ascii_case(name));
        let named = find("source").is_some() || find("target").is_some();
        Self {
            source: find("source").unwrap_or(0),
            target: find("target").unwrap_or(1),
            weight: find("weight").or_else(|| (!named && header.len() >= 3).then_some(2)),
            label: find("label"),
        }
    }
}

/// Parse an edge table.
///
/// `source`, `target` and `weight` columns are located by header name
/// (case-insensitive), falling back to positions 0, 1 and 2. Other columns
/// are ignored. Without a weight column each row counts as one observation.
pub fn parse_edges<R: BufRead>(reader: R, path: &Path) -> LoadResult<Vec<EdgeRecord>> {
    let mut edges = Vec::new();
    read_edges(reader, path, |edge, _| edges.push(edge))?;
    Ok(edges)
}

/// An edge row together with its pair label, if the table has one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelledEdge {
    pub edge: EdgeRecord,
    pub label: Option<String>,
}

/// Parse an edge table keeping the `label` column.
///
/// A label in the last column may contain the delimiter; it runs to the end
/// of the row.
pub fn parse_labelled_edges<R: BufRead>(reader: R, path: &Path) -> LoadResult<Vec<LabelledEdge>> {
    let mut edges = Vec::new();
    read_edges(reader, path, |edge, label| {
        edges.push(LabelledEdge {
            edge,
            label: label.map(str::to_string),
        })
    })?;
    Ok(edges)
}

fn read_edges<R, F>(reader: R, path: &Path, mut push: F) -> LoadResult<()>
where
    R: BufRead,
    F: FnMut(EdgeRecord, Option<&str>),
{
    let (mut table, header) = TableReader::open(reader, path)?;
    let columns = EdgeColumns::from_header(&header);
    debug!("Edge columns for {}: {:?}", path.display(), columns);
    let last = header.len().saturating_sub(1);

    while let Some((line_no, line)) = table.next_row()? {
        let fields = table.split(&line);
        let source: NodeId = parse_field(path, line_no, fields.get(columns.source).copied(), "source id")?;
        let target: NodeId = parse_field(path, line_no, fields.get(columns.target).copied(), "target id")?;
        let weight: Weight = match columns.weight {
            Some(col) => parse_field(path, line_no, fields.get(col).copied(), "weight")?,
            None => 1,
        };
        let label = match columns.label {
            Some(col) if col == last && fields.len() > header.len() => line
                .splitn(col + 1, table.delimiter.as_char())
                .nth(col)
                .map(str::trim),
            Some(col) => fields.get(col).copied(),
            None => None,
        };
        push(EdgeRecord::new(source, target, weight), label.filter(|l| !l.is_empty()));
    }

    Ok(())
}

/// Parse a candidate id list: one id per line, no header.
///
/// Every id must exist in `store`. Duplicates are dropped, first occurrence
/// order is kept.
pub fn parse_candidates<R: BufRead>(
    reader: R,
    path: &Path,
    store: &GraphStore,
) -> LoadResult<Vec<NodeId>> {
    let mut ids = IndexSet::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| LoadError::io(path, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let line_no = idx + 1;
        let id: u64 = parse_field(path, line_no, Some(trimmed), "node id")?;
        let node = NodeId::try_from(id)
            .ok()
            .filter(|&n| store.contains(n))
            .ok_or(LoadError::UnknownCandidate {
                path: path.to_path_buf(),
                line: line_no,
                id,
            })?;
        ids.insert(node);
    }

    Ok(ids.into_iter().collect())
}

pub fn load_nodes(path: &Path) -> LoadResult<Vec<NodeRecord>> {
    let nodes = parse_nodes(open(path)?, path)?;
    info!("Loaded {} nodes from {}", nodes.len(), path.display());
    Ok(nodes)
}

pub fn load_edges(path: &Path) -> LoadResult<Vec<EdgeRecord>> {
    let edges = parse_edges(open(path)?, path)?;
    info!("Loaded {} edge rows from {}", edges.len(), path.display());
    Ok(edges)
}

/// Load the candidate list, or every node id when no file is given
pub fn load_candidates(path: Option<&Path>, store: &GraphStore) -> LoadResult<Vec<NodeId>> {
    match path {
        Some(path) => {
            let ids = parse_candidates(open(path)?, path, store)?;
            info!("Loaded {} candidate ids from {}", ids.len(), path.display());
            Ok(ids)
        }
        None => Ok(store.node_ids().collect()),
    }
}

/// Load node and edge tables and build the graph store
pub fn load_graph(nodes: &Path, edges: &Path, options: BuildOptions) -> LoadResult<GraphStore> {
    let node_records = load_nodes(nodes)?;
    let edge_records = load_edges(edges)?;
    Ok(GraphStore::build(node_records, edge_records, options)?)
}
