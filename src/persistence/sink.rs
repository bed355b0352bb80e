//! Result sinks
//!
//! Line-oriented output files for similarity and ego results. Files are
//! opened in append mode so resumed runs extend the previous output.

use crate::graph::GraphStore;
use rostergraph_algorithms::{EgoSizes, ScoredPair};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::warn;

/// Destination for the results of one computation
pub trait ResultSink<T>: Send {
    /// Write one node's result
    fn write(&mut self, store: &GraphStore, result: &T) -> io::Result<()>;

    /// Make everything written so far durable
    fn flush(&mut self) -> io::Result<()>;
}

/// Round half away from zero to `digits` decimals
pub fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Length of `file` up to and including its last newline
fn terminated_len(file: &mut File) -> io::Result<u64> {
    let mut end = file.metadata()?.len();
    let mut block = [0u8; 4096];
    while end > 0 {
        let start = end.saturating_sub(block.len() as u64);
        let chunk = &mut block[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|&b| b == b'\n') {
            return Ok(start + pos as u64 + 1);
        }
        end = start;
    }
    Ok(0)
}

/// Open `path` for appending whole rows.
///
/// A trailing row without a newline was cut short by an interrupted run. Its
/// node is not in the checkpoint, so the row is dropped and recomputed.
fn open_append(path: &Path) -> io::Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)?;

    let len = file.metadata()?.len();
    let valid_len = terminated_len(&mut file)?;
    if valid_len < len {
        warn!(
            "Dropping {} bytes of unterminated output at the end of {:?}",
            len - valid_len,
            path
        );
        file.set_len(valid_len)?;
    }
    file.seek(SeekFrom::End(0))?;
    Ok(BufWriter::new(file))
}

fn lookup_error(e: crate::graph::GraphError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

/// Writes `label_a,label_b,score` rows
pub struct SimilaritySink<W> {
    out: W,
    precision: u32,
}

impl SimilaritySink<BufWriter<File>> {
    pub fn append(path: impl AsRef<Path>, precision: u32) -> io::Result<Self> {
        Ok(Self::new(open_append(path.as_ref())?, precision))
    }
}

impl<W: Write> SimilaritySink<W> {
    pub fn new(out: W, precision: u32) -> Self {
        Self { out, precision }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> ResultSink<Vec<ScoredPair>> for SimilaritySink<W> {
    fn write(&mut self, store: &GraphStore, result: &Vec<ScoredPair>) -> io::Result<()> {
        for pair in result {
            let a = store.label(pair.source).map_err(lookup_error)?;
            let b = store.label(pair.target).map_err(lookup_error)?;
            writeln!(
                self.out,
                "{},{},{:.*}",
                a,
                b,
                self.precision as usize,
                round_to(pair.score, self.precision)
            )?;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Writes `node_id,hop,fraction` rows, `fraction = count / N`
pub struct EgoSink<W> {
    out: W,
    precision: u32,
}

impl EgoSink<BufWriter<File>> {
    pub fn append(path: impl AsRef<Path>, precision: u32) -> io::Result<Self> {
        Ok(Self::new(open_append(path.as_ref())?, precision))
    }
}

impl<W: Write> EgoSink<W> {
    pub fn new(out: W, precision: u32) -> Self {
        Self { out, precision }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> ResultSink<EgoSizes> for EgoSink<W> {
    fn write(&mut self, store: &GraphStore, result: &EgoSizes) -> io::Result<()> {
        for (hop, fraction) in result.fractions(store.node_count()) {
            writeln!(
                self.out,
                "{},{},{:.*}",
                result.source,
                hop,
                self.precision as usize,
                round_to(fraction, self.precision)
            )?;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Keeps results in memory, in the order they were written
#[derive(Debug)]
pub struct MemorySink<T> {
    pub results: Vec<T>,
}

impl<T> Default for MemorySink<T> {
    fn default() -> Self {
        Self { results: Vec::new() }
    }
}

impl<T: Clone + Send> ResultSink<T> for MemorySink<T> {
    fn write(&mut self, _store: &GraphStore, result: &T) -> io::Result<()> {
        self.results.push(result.clone());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BuildOptions, EdgeRecord, NodeRecord};

    fn store() -> GraphStore {
        let nodes = vec![
            NodeRecord::new(1, "Ann"),
            NodeRecord::new(2, "Bo"),
            NodeRecord::new(3, "Cy"),
            NodeRecord::new(4, "Di"),
        ];
        let edges = vec![
            EdgeRecord::new(1, 2, 3),
            EdgeRecord::new(2, 3, 1),
            EdgeRecord::new(1, 3, 2),
        ];
        GraphStore::build(nodes, edges, BuildOptions::default()).unwrap()
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(0.6667, 2), 0.67);
        assert_eq!(round_to(0.75, 4), 0.75);
    }

    #[test]
    fn test_similarity_rows() {
        let store = store();
        let mut sink = SimilaritySink::new(Vec::new(), 2);
        let result = vec![
            ScoredPair { source: 1, target: 4, score: 1.23456 },
            ScoredPair { source: 1, target: 2, score: 0.5 },
        ];
        sink.write(&store, &result).unwrap();
        sink.flush().unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "Ann,Di,1.23\nAnn,Bo,0.50\n");
    }

    #[test]
    fn test_ego_rows() {
        let store = store();
        let mut sink = EgoSink::new(Vec::new(), 4);
        sink.write(&store, &EgoSizes { source: 1, counts: vec![2, 3] }).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "1,1,0.5000\n1,2,0.7500\n");
    }

    #[test]
    fn test_unknown_node_is_invalid_data() {
        let store = store();
        let mut sink = SimilaritySink::new(Vec::new(), 2);
        let bad = vec![ScoredPair { source: 1, target: 99, score: 1.0 }];
        let err = sink.write(&store, &bad).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_append_across_runs() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ego_results.csv");
        let store = store();

        for source in [1, 2] {
            let mut sink = EgoSink::append(&path, 4).unwrap();
            sink.write(&store, &EgoSizes { source, counts: vec![2] }).unwrap();
            sink.flush().unwrap();
        }

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "1,1,0.5000\n2,1,0.5000\n");
    }

    #[test]
    fn test_append_drops_torn_row() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("similarity_results.csv");
        std::fs::write(&path, "Ann,Di,2.00\nAnn,D").unwrap();

        let store = store();
        let mut sink = SimilaritySink::append(&path, 2).unwrap();
        sink.write(&store, &vec![ScoredPair { source: 2, target: 4, score: 1.0 }])
            .unwrap();
        sink.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Ann,Di,2.00\nBo,Di,1.00\n");
    }

    #[test]
    fn test_append_drops_torn_only_row() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ego_results.csv");
        // Longer than one scan block, no newline anywhere
        std::fs::write(&path, "9".repeat(5000)).unwrap();

        let mut sink = EgoSink::append(&path, 4).unwrap();
        sink.write(&store(), &EgoSizes { source: 1, counts: vec![2] }).unwrap();
        sink.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1,1,0.5000\n");
    }

    #[test]
    fn test_terminated_len_spans_blocks() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let mut content = "1,1,0.5000\n".to_string();
        content.push_str(&"x".repeat(9000));
        std::fs::write(&path, &content).unwrap();

        let mut file = File::open(&path).unwrap();
        assert_eq!(terminated_len(&mut file).unwrap(), 11);
    }
}
