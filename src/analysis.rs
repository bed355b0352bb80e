//! Analysis runs
//!
//! Ties the pieces together: load the graph once, then run similarity or ego
//! jobs over the candidate ids with a checkpointed, appending output file.

use crate::algo::{EgoJob, SimilarityJob};
use crate::config::AnalysisConfig;
use crate::distributor::{CancelToken, Job, RunSummary, WorkDistributor};
use crate::error::{Error, Result};
use crate::graph::{GraphStore, NodeId};
use crate::persistence::{EgoSink, FileCheckpoint, ResultSink, SimilaritySink};
use crate::tables::{load_candidates, load_graph};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A loaded graph plus the ids to process
pub struct Analysis {
    config: AnalysisConfig,
    store: Arc<GraphStore>,
    candidates: Vec<NodeId>,
}

impl Analysis {
    /// Validate the config, then load the graph and candidate list
    pub fn load(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;

        let store = load_graph(&config.nodes, &config.edges, config.build_options())?;
        let candidates = load_candidates(config.candidates.as_deref(), &store)?;
        info!(
            "Graph ready: {} nodes, {} edges, {:?} storage, {} candidates",
            store.node_count(),
            store.edge_count(),
            store.storage(),
            candidates.len()
        );

        Ok(Self {
            config,
            store: Arc::new(store),
            candidates,
        })
    }

    /// Wrap an already-built store; candidates default to every node
    pub fn from_store(config: AnalysisConfig, store: GraphStore, candidates: Option<Vec<NodeId>>) -> Result<Self> {
        config.validate()?;
        let candidates = candidates.unwrap_or_else(|| store.node_ids().collect());
        for &id in &candidates {
            store.index(id)?;
        }
        Ok(Self {
            config,
            store: Arc::new(store),
            candidates,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn candidates(&self) -> &[NodeId] {
        &self.candidates
    }

    /// Top-K similarity search for every candidate against every candidate
    pub fn run_similarity(&self, cancel: &CancelToken) -> Result<RunSummary> {
        let job = SimilarityJob::new(&self.store, &self.candidates, self.config.similarity_config())?;
        let path = self.config.similarity_results();
        let mut sink = SimilaritySink::append(&path, self.config.score_precision)
            .map_err(|source| Error::Output { path, source })?;
        self.run(job, &self.config.similarity_checkpoint(), &mut sink, cancel)
    }

    /// Ego network sizes up to `max_hops` for every candidate
    pub fn run_ego(&self, cancel: &CancelToken) -> Result<RunSummary> {
        let job = EgoJob::new(self.config.max_hops);
        let path = self.config.ego_results();
        let mut sink = EgoSink::append(&path, self.config.fraction_precision)
            .map_err(|source| Error::Output { path, source })?;
        self.run(job, &self.config.ego_checkpoint(), &mut sink, cancel)
    }

    fn run<J, S>(&self, job: J, checkpoint: &Path, sink: &mut S, cancel: &CancelToken) -> Result<RunSummary>
    where
        J: Job,
        S: ResultSink<J::Output>,
    {
        let mut checkpoint = FileCheckpoint::open(checkpoint)?;
        let distributor = WorkDistributor::new(self.config.distributor_config())?;
        let summary = distributor.run(
            Arc::new(job),
            Arc::clone(&self.store),
            &self.candidates,
            &mut checkpoint,
            sink,
            cancel,
        )?;
        Ok(summary)
    }
}
