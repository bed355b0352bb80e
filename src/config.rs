//! Analysis configuration
//!
//! Loaded from a YAML file, then overridden field by field from the command
//! line. Every field has a default, so an empty file is a valid config.

use crate::distributor::{default_workers, DistributorConfig};
use crate::graph::{BuildOptions, StorageStrategy};
use rostergraph_algorithms::{SimilarityConfig, DEFAULT_DENSE_BUDGET_BYTES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const SIMILARITY_RESULTS: &str = "similarity_results.csv";
pub const SIMILARITY_CHECKPOINT: &str = "processed_similarity_ids.txt";
pub const EGO_RESULTS: &str = "ego_results.csv";
pub const EGO_CHECKPOINT: &str = "processed_ego_ids.txt";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Node table (`id,label`)
    pub nodes: PathBuf,
    /// Weighted edge table (`source,target,weight[,type]`)
    pub edges: PathBuf,
    /// Optional candidate id list; every node when absent
    pub candidates: Option<PathBuf>,
    /// Directory for results and checkpoint logs
    pub output_dir: PathBuf,

    pub storage: StorageStrategy,
    /// Largest dense matrix `Auto` storage may allocate
    pub dense_budget_bytes: u64,

    pub top_k: usize,
    /// Minimum weighted degree for a node to be searched
    pub degree_threshold: u64,
    pub max_hops: usize,

    /// Decimals for similarity scores
    pub score_precision: u32,
    /// Decimals for ego fractions
    pub fraction_precision: u32,

    pub workers: usize,
    pub channel_capacity: usize,
    pub chunk_timeout_secs: Option<u64>,
    pub max_attempts: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            nodes: PathBuf::from("data/player_graph/nodes.csv"),
            edges: PathBuf::from("data/player_graph/edges.csv"),
            candidates: None,
            output_dir: PathBuf::from("data/results"),
            storage: StorageStrategy::Auto,
            dense_budget_bytes: DEFAULT_DENSE_BUDGET_BYTES,
            top_k: 10,
            degree_threshold: 1,
            max_hops: 6,
            score_precision: 2,
            fraction_precision: 4,
            workers: default_workers(),
            channel_capacity: 1024,
            chunk_timeout_secs: None,
            max_attempts: 3,
        }
    }
}

impl AnalysisConfig {
    /// Parse a YAML document
    pub fn from_yaml(text: &str, path: &Path) -> ConfigResult<Self> {
        serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a YAML config file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text, path)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let checks = [
            (self.top_k < 1, "top_k must be at least 1"),
            (self.max_hops < 1, "max_hops must be at least 1"),
            (self.workers == 0, "workers must be at least 1"),
            (self.channel_capacity == 0, "channel_capacity must be at least 1"),
            (self.max_attempts == 0, "max_attempts must be at least 1"),
            (self.chunk_timeout_secs == Some(0), "chunk_timeout_secs must be positive"),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(ConfigError::Invalid((*message).to_string())),
            None => Ok(()),
        }
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            strategy: self.storage,
            dense_budget_bytes: self.dense_budget_bytes,
        }
    }

    pub fn similarity_config(&self) -> SimilarityConfig {
        SimilarityConfig {
            top_k: self.top_k,
            degree_threshold: self.degree_threshold,
        }
    }

    pub fn distributor_config(&self) -> DistributorConfig {
        DistributorConfig {
            workers: self.workers,
            channel_capacity: self.channel_capacity,
            chunk_timeout: self.chunk_timeout_secs.map(Duration::from_secs),
            max_attempts: self.max_attempts,
            ..Default::default()
        }
    }

    pub fn similarity_results(&self) -> PathBuf {
        self.output_dir.join(SIMILARITY_RESULTS)
    }

    pub fn similarity_checkpoint(&self) -> PathBuf {
        self.output_dir.join(SIMILARITY_CHECKPOINT)
    }

    pub fn ego_results(&self) -> PathBuf {
        self.output_dir.join(EGO_RESULTS)
    }

    pub fn ego_checkpoint(&self) -> PathBuf {
        self.output_dir.join(EGO_CHECKPOINT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.top_k, 10);
        assert_eq!(config.degree_threshold, 1);
        assert_eq!(config.max_hops, 6);
        assert_eq!(config.score_precision, 2);
        assert_eq!(config.fraction_precision, 4);
        assert_eq!(config.storage, StorageStrategy::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "nodes: in/nodes.csv\ntop_k: 5\nstorage: sparse\nchunk_timeout_secs: 30\n";
        let config = AnalysisConfig::from_yaml(yaml, Path::new("test.yaml")).unwrap();
        assert_eq!(config.nodes, PathBuf::from("in/nodes.csv"));
        assert_eq!(config.top_k, 5);
        assert_eq!(config.storage, StorageStrategy::Sparse);
        assert_eq!(config.max_hops, 6);
        assert_eq!(
            config.distributor_config().chunk_timeout,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = AnalysisConfig::from_yaml("top_kk: 5\n", Path::new("test.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validate() {
        let config = AnalysisConfig { top_k: 0, ..Default::default() };
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "Invalid configuration: top_k must be at least 1"
        );
        assert!(AnalysisConfig { max_hops: 0, ..Default::default() }.validate().is_err());
        assert!(AnalysisConfig { workers: 0, ..Default::default() }.validate().is_err());
        assert!(AnalysisConfig { channel_capacity: 0, ..Default::default() }.validate().is_err());
    }

    #[test]
    fn test_output_paths() {
        let config = AnalysisConfig {
            output_dir: PathBuf::from("out"),
            ..Default::default()
        };
        assert_eq!(config.similarity_results(), PathBuf::from("out/similarity_results.csv"));
        assert_eq!(config.ego_checkpoint(), PathBuf::from("out/processed_ego_ids.txt"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = AnalysisConfig::load(Path::new("/nonexistent/rostergraph.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
