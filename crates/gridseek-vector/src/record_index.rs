//! Vector index and attribute table kept as one unit.

use serde::{Deserialize, Serialize};

use gridseek_core::error::{Error, Result};
use gridseek_core::predicate::Predicate;
use gridseek_core::types::{missing_provenance, Attributes, RecordId};

use crate::distance::Neighbor;
use crate::index::VectorIndex;
use crate::metadata::MetadataStore;
use crate::strategy::IndexStrategy;

/// Every vector in `index` has exactly one attribute record in `metadata`
/// under the same id. Ids come from `next_id` and are never reused.
#[derive(Debug, Clone)]
pub struct RecordIndex {
    pub(crate) index: VectorIndex,
    pub(crate) metadata: MetadataStore,
    pub(crate) next_id: RecordId,
    pub(crate) embedder_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStatistics {
    pub record_count: usize,
    pub dimension: usize,
    pub strategy: IndexStrategy,
    pub effective_partitions: Option<usize>,
    pub embedder_id: String,
    pub next_id: RecordId,
}

impl RecordIndex {
    pub fn build(strategy: IndexStrategy, dimension: usize, embedder_id: impl Into<String>) -> Result<Self> {
        let index = VectorIndex::build(strategy, dimension)?;
        tracing::info!(strategy = strategy.kind().as_str(), dimension, "built empty index");
        Ok(Self { index, metadata: MetadataStore::new(), next_id: 0, embedder_id: embedder_id.into() })
    }

    /// Insert `(vector, attributes)` pairs; returns the assigned ids. Nothing
    /// is stored unless the whole batch is valid.
    pub fn insert_records(&mut self, records: Vec<(Vec<f32>, Attributes)>) -> Result<Vec<RecordId>> {
        for (position, (_, attributes)) in records.iter().enumerate() {
            let missing = missing_provenance(attributes);
            if !missing.is_empty() {
                return Err(Error::InvalidRecord(format!("record {} lacks provenance fields: {}", position, missing.join(", "))));
            }
        }
        let ids: Vec<RecordId> = (self.next_id..self.next_id + records.len() as u64).collect();
        let (vectors, attributes): (Vec<Vec<f32>>, Vec<Attributes>) = records.into_iter().unzip();
        self.index.insert_all(&vectors, &ids)?;
        for (id, attrs) in ids.iter().zip(attributes) { self.metadata.put(*id, attrs); }
        self.next_id += ids.len() as u64;
        tracing::info!(inserted = ids.len(), total = self.len(), "inserted records");
        Ok(ids)
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> { self.index.search(query, k) }

    pub fn attributes(&self, id: RecordId) -> Option<&Attributes> { self.metadata.get(id) }

    pub fn matches(&self, id: RecordId, predicate: &Predicate) -> bool { self.metadata.matches(id, predicate) }

    pub fn len(&self) -> usize { self.index.len() }
    pub fn is_empty(&self) -> bool { self.index.is_empty() }
    pub fn dimension(&self) -> usize { self.index.dimension() }
    pub fn strategy(&self) -> IndexStrategy { self.index.strategy() }
    pub fn embedder_id(&self) -> &str { &self.embedder_id }

    pub fn statistics(&self) -> IndexStatistics {
        IndexStatistics {
            record_count: self.len(),
            dimension: self.dimension(),
            strategy: self.strategy(),
            effective_partitions: self.index.effective_partitions(),
            embedder_id: self.embedder_id.clone(),
            next_id: self.next_id,
        }
    }
}
