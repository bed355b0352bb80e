//! Top-level error type
//!
//! Wraps the per-module errors and tags each with the pipeline stage that
//! failed, so the CLI can say whether loading, computing or writing broke.

use crate::config::ConfigError;
use crate::distributor::DistributorError;
use crate::export::ExportError;
use crate::graph::GraphError;
use crate::persistence::CheckpointError;
use crate::tables::LoadError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Load,
    Compute,
    Write,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Config => "config",
            Stage::Load => "load",
            Stage::Compute => "compute",
            Stage::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Failed to open {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Run failed: {0}")]
    Distributor(#[from] DistributorError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

impl From<GraphError> for Error {
    fn from(e: GraphError) -> Self {
        Error::Load(LoadError::Graph(e))
    }
}

impl Error {
    pub fn stage(&self) -> Stage {
        match self {
            Error::Config(_) => Stage::Config,
            Error::Load(_) | Error::Checkpoint(_) => Stage::Load,
            Error::Output { .. } => Stage::Write,
            Error::Distributor(e) => match e {
                DistributorError::Config(_) => Stage::Config,
                DistributorError::Pool(_) | DistributorError::Runtime(_) => Stage::Compute,
                DistributorError::Output { .. }
                | DistributorError::Flush(_)
                | DistributorError::Checkpoint { .. }
                | DistributorError::CheckpointFlush(_) => Stage::Write,
            },
            Error::Export(e) => match e {
                ExportError::Json(_) => Stage::Write,
                ExportError::Io { .. } | ExportError::Malformed { .. } | ExportError::UnknownLabel { .. } => {
                    Stage::Load
                }
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
