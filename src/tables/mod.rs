//! Line-oriented input tables
//!
//! Node, edge and candidate files are small delimited text files produced by
//! the roster scraper. Parsing here is deliberately thin: locate columns,
//! parse integers, report the file and line of anything malformed.

pub mod combine;
pub mod loader;

pub use combine::{combine_raw_edges, CombineSummary};
pub use loader::{
    load_candidates, load_edges, load_graph, load_nodes, parse_candidates, parse_edges,
    parse_labelled_edges, parse_nodes, LabelledEdge,
};

use crate::graph::GraphError;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading or writing tables
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: missing header row", .path.display())]
    MissingHeader { path: PathBuf },

    #[error("{}:{line}: {message}", .path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}:{line}: candidate node {id} is not in the graph", .path.display())]
    UnknownCandidate { path: PathBuf, line: usize, id: u64 },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type LoadResult<T> = Result<T, LoadError>;

impl LoadError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        LoadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed(path: &Path, line: usize, message: impl Into<String>) -> Self {
        LoadError::Malformed {
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }
}

/// Column delimiter of a table, detected from its header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Tab,
}

impl Delimiter {
    pub fn detect(header: &str) -> Self {
        if header.contains('\t') {
            Delimiter::Tab
        } else {
            Delimiter::Comma
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Delimiter::Comma => ',',
            Delimiter::Tab => '\t',
        }
    }
}

pub(crate) fn open(path: &Path) -> LoadResult<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| LoadError::io(path, e))
}
