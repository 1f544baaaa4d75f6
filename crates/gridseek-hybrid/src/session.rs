//! An owned retrieval session: embedder, shared index and retrieval settings.
//! Several sessions may live in one process; nothing here is global.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use gridseek_core::error::{Error, Result};
use gridseek_core::predicate::Predicate;
use gridseek_core::traits::{Embedder, RecordSource};
use gridseek_core::types::{RecordId, RetrievalResult, SourceRecord};
use gridseek_vector::{IndexManifest, IndexStatistics, RecordIndex, StrategyPolicy};

use crate::aggregate::{aggregate, GroupSummary};
use crate::rerank::apply_boosts;
use crate::retriever::{HybridRetriever, RetrieverOptions, DEFAULT_OVERFETCH_FACTOR};
use crate::scoring::ScoreNormalizer;

/// `[retrieval]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub overfetch_factor: usize,
    pub min_similarity: Option<f32>,
    pub normalizer: ScoreNormalizer,
    /// attribute -> score multiplier
    pub boosts: BTreeMap<String, f32>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            overfetch_factor: DEFAULT_OVERFETCH_FACTOR,
            min_similarity: None,
            normalizer: ScoreNormalizer::default(),
            boosts: BTreeMap::new(),
        }
    }
}

impl RetrievalSettings {
    pub fn retriever_options(&self) -> RetrieverOptions {
        RetrieverOptions { overfetch_factor: self.overfetch_factor.max(1), normalizer: self.normalizer }
    }
}

/// How [`RetrievalSession::open_or_ingest`] obtained its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Loaded,
    Rebuilt,
}

pub struct RetrievalSession {
    embedder: Arc<dyn Embedder>,
    retriever: HybridRetriever,
    policy: StrategyPolicy,
    settings: RetrievalSettings,
}

impl RetrievalSession {
    pub fn new(embedder: Arc<dyn Embedder>, policy: StrategyPolicy, settings: RetrievalSettings) -> Self {
        let retriever = HybridRetriever::new(settings.retriever_options());
        Self { embedder, retriever, policy, settings }
    }

    pub fn retriever(&self) -> &HybridRetriever { &self.retriever }
    pub fn settings(&self) -> &RetrievalSettings { &self.settings }

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.embedder.embed_batch(texts).map_err(|e| Error::Embedding(format!("{:#}", e)))?;
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!("embedder returned {} vectors for {} texts", vectors.len(), texts.len())));
        }
        let dim = self.embedder.dim();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::DimensionMismatch { expected: dim, actual: bad.len() });
        }
        Ok(vectors)
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let v = self.embedder.embed(text).map_err(|e| Error::Embedding(format!("{:#}", e)))?;
        if v.len() != self.embedder.dim() {
            return Err(Error::DimensionMismatch { expected: self.embedder.dim(), actual: v.len() });
        }
        Ok(v)
    }

    /// Rebuild the index from scratch. Embedding and construction happen
    /// outside the lock; the finished index is swapped in at the end.
    pub fn ingest(&self, records: Vec<SourceRecord>) -> Result<IndexStatistics> {
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let vectors = self.embed_texts(&texts)?;
        let strategy = self.policy.select(records.len());
        tracing::info!(records = records.len(), strategy = strategy.kind().as_str(), "selected index strategy");
        let mut index = RecordIndex::build(strategy, self.embedder.dim(), self.embedder.embedder_id())?;
        index.insert_records(vectors.into_iter().zip(records.into_iter().map(|r| r.attributes)).collect())?;
        let stats = index.statistics();
        self.retriever.replace(index)?;
        Ok(stats)
    }

    pub fn ingest_from(&self, source: &dyn RecordSource) -> Result<IndexStatistics> {
        let records = source.records().map_err(|e| Error::InvalidRecord(format!("{:#}", e)))?;
        self.ingest(records)
    }

    /// Add records to the current index without changing its strategy.
    pub fn append(&self, records: Vec<SourceRecord>) -> Result<Vec<RecordId>> {
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let vectors = self.embed_texts(&texts)?;
        self.retriever.insert(vectors.into_iter().zip(records.into_iter().map(|r| r.attributes)).collect())
    }

    /// Embed `query_text` and retrieve. `min_similarity` falls back to the
    /// configured floor; configured boosts are applied last.
    pub fn retrieve(
        &self,
        query_text: &str,
        k: usize,
        predicate: Option<&Predicate>,
        min_similarity: Option<f32>,
    ) -> Result<Vec<RetrievalResult>> {
        let query = self.embed_query(query_text)?;
        let mut results = self.retriever.retrieve(&query, k, predicate, min_similarity.or(self.settings.min_similarity))?;
        apply_boosts(&mut results, &self.settings.boosts);
        Ok(results)
    }

    pub fn aggregate(
        &self,
        query_text: &str,
        k: usize,
        predicate: Option<&Predicate>,
        group_by: &str,
        sum_attribute: &str,
    ) -> Result<BTreeMap<String, GroupSummary>> {
        let results = self.retrieve(query_text, k, predicate, None)?;
        Ok(aggregate(&results, group_by, sum_attribute))
    }

    pub fn persist(&self, dir: &Path) -> Result<IndexManifest> { self.retriever.persist(dir) }

    pub fn load(&self, dir: &Path) -> Result<()> {
        self.retriever.load(dir, self.embedder.dim(), &self.embedder.embedder_id())
    }

    /// Load the index at `dir`; when none exists, ingest from `source` and
    /// persist. Incompatible indexes are reported, not rebuilt.
    pub fn open_or_ingest(&self, dir: &Path, source: &dyn RecordSource) -> Result<OpenOutcome> {
        match self.load(dir) {
            Ok(()) => Ok(OpenOutcome::Loaded),
            Err(Error::NotFound(reason)) => {
                tracing::info!(%reason, "no persisted index, building from source");
                self.ingest_from(source)?;
                self.persist(dir)?;
                Ok(OpenOutcome::Rebuilt)
            }
            Err(e) => Err(e),
        }
    }

    pub fn statistics(&self) -> Result<IndexStatistics> { self.retriever.statistics() }
}
