//! Vector search plus post-hoc attribute filtering over a shared index.

use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use gridseek_core::error::{Error, Result};
use gridseek_core::predicate::Predicate;
use gridseek_core::types::{Attributes, RecordId, RetrievalResult};
use gridseek_vector::{IndexManifest, IndexStatistics, IndexStrategy, RecordIndex};

use crate::scoring::ScoreNormalizer;

/// Candidate widening applied when a predicate is present.
pub const DEFAULT_OVERFETCH_FACTOR: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrieverOptions {
    pub overfetch_factor: usize,
    pub normalizer: ScoreNormalizer,
}

impl Default for RetrieverOptions {
    fn default() -> Self { Self { overfetch_factor: DEFAULT_OVERFETCH_FACTOR, normalizer: ScoreNormalizer::default() } }
}

/// Cloning shares the underlying index. Readers (`retrieve`, `persist`,
/// `statistics`) run concurrently; `build`, `insert` and `replace` take the
/// write side.
#[derive(Clone, Default)]
pub struct HybridRetriever {
    state: Arc<RwLock<Option<RecordIndex>>>,
    options: RetrieverOptions,
}

impl HybridRetriever {
    pub fn new(options: RetrieverOptions) -> Self { Self { state: Arc::new(RwLock::new(None)), options } }

    pub fn with_index(index: RecordIndex, options: RetrieverOptions) -> Self {
        Self { state: Arc::new(RwLock::new(Some(index))), options }
    }

    pub fn options(&self) -> &RetrieverOptions { &self.options }

    fn read(&self) -> Result<RwLockReadGuard<'_, Option<RecordIndex>>> {
        self.state.read().map_err(|e| Error::Operation(format!("Lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Option<RecordIndex>>> {
        self.state.write().map_err(|e| Error::Operation(format!("Lock poisoned: {}", e)))
    }

    pub fn is_ready(&self) -> Result<bool> { Ok(self.read()?.is_some()) }

    /// Replace the current state with an empty index.
    pub fn build(&self, strategy: IndexStrategy, dimension: usize, embedder_id: &str) -> Result<()> {
        let index = RecordIndex::build(strategy, dimension, embedder_id)?;
        *self.write()? = Some(index);
        Ok(())
    }

    /// Swap in a fully built index.
    pub fn replace(&self, index: RecordIndex) -> Result<()> {
        *self.write()? = Some(index);
        Ok(())
    }

    pub fn insert(&self, records: Vec<(Vec<f32>, Attributes)>) -> Result<Vec<RecordId>> {
        let mut guard = self.write()?;
        let index = guard.as_mut().ok_or(Error::IndexNotReady)?;
        index.insert_records(records)
    }

    /// Read from disk without holding the lock, then swap in.
    pub fn load(&self, dir: &Path, dimension: usize, embedder_id: &str) -> Result<()> {
        let index = RecordIndex::load(dir, dimension, embedder_id)?;
        self.replace(index)
    }

    pub fn persist(&self, dir: &Path) -> Result<IndexManifest> {
        let guard = self.read()?;
        guard.as_ref().ok_or(Error::IndexNotReady)?.persist(dir)
    }

    pub fn statistics(&self) -> Result<IndexStatistics> {
        Ok(self.read()?.as_ref().ok_or(Error::IndexNotReady)?.statistics())
    }

    /// Up to `k` results ordered by descending score, ties by ascending id,
    /// ranked from 1. With a non-empty predicate the index is asked for
    /// `k * overfetch_factor` candidates before filtering, so fewer than `k`
    /// may survive.
    pub fn retrieve(
        &self,
        query: &[f32],
        k: usize,
        predicate: Option<&Predicate>,
        min_similarity: Option<f32>,
    ) -> Result<Vec<RetrievalResult>> {
        let guard = self.read()?;
        let index = guard.as_ref().ok_or(Error::IndexNotReady)?;
        if query.len() != index.dimension() {
            return Err(Error::DimensionMismatch { expected: index.dimension(), actual: query.len() });
        }
        if let Some(bad) = query.iter().position(|x| !x.is_finite()) {
            return Err(Error::InvalidRecord(format!("query component {} is not finite", bad)));
        }
        if k == 0 { return Ok(vec![]); }

        let filter = predicate.filter(|p| !p.is_empty());
        let fetch = if filter.is_some() { k.saturating_mul(self.options.overfetch_factor).max(k) } else { k };
        let hits = index.search(query, fetch)?;
        let fetched = hits.len();

        let kept: Vec<_> = hits
            .into_iter()
            .filter_map(|hit| {
                let attributes = index.attributes(hit.id)?;
                filter.map_or(true, |p| p.matches(attributes)).then_some((hit, attributes))
            })
            .collect();
        let distances: Vec<f32> = kept.iter().map(|(hit, _)| hit.distance).collect();
        let scores = self.options.normalizer.scores(&distances);

        let mut results: Vec<RetrievalResult> = kept
            .into_iter()
            .zip(scores)
            .filter(|(_, score)| min_similarity.map_or(true, |floor| *score >= floor))
            .map(|((hit, attributes), score)| RetrievalResult {
                record_id: hit.id,
                attributes: attributes.clone(),
                raw_distance: hit.distance,
                similarity_score: score,
                rank: 0,
                boosted_score: None,
            })
            .collect();
        results.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score).then(a.record_id.cmp(&b.record_id)));
        results.truncate(k);
        for (i, r) in results.iter_mut().enumerate() { r.rank = i + 1; }

        tracing::debug!(k, fetched, returned = results.len(), filtered = filter.is_some(), "retrieve");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridseek_core::types::{DISPLAY_TEXT, SOURCE_COLLECTION, SOURCE_LOCATION};

    fn attrs(i: usize, source_type: &str) -> Attributes {
        let mut a = Attributes::new();
        a.insert(SOURCE_COLLECTION.into(), "plants".into());
        a.insert(SOURCE_LOCATION.into(), format!("plants.jsonl:{}", i).into());
        a.insert(DISPLAY_TEXT.into(), format!("{} plant {}", source_type, i).into());
        a.insert("source_type".into(), source_type.into());
        a
    }

    fn three_point_retriever() -> HybridRetriever {
        let retriever = HybridRetriever::default();
        retriever.build(IndexStrategy::Exact, 2, "test").unwrap();
        retriever
            .insert(vec![
                (vec![0.0, 0.0], attrs(1, "wind")),
                (vec![2.0, 0.0], attrs(2, "solar")),
                (vec![3.0, 1.0], attrs(3, "wind")),
            ])
            .unwrap();
        retriever
    }

    #[test]
    fn distance_to_score_scenario() {
        let results = three_point_retriever().retrieve(&[0.0, 0.0], 3, None, None).unwrap();
        let scores: Vec<f32> = results.iter().map(|r| r.similarity_score).collect();
        assert_eq!(scores[0], 1.0);
        assert!((scores[1] - 0.2).abs() < 1e-6);
        assert!((scores[2] - 0.090_909).abs() < 1e-5);
        assert_eq!(results.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(results[1].raw_distance, 4.0);
    }

    #[test]
    fn min_similarity_keeps_only_close_hits() {
        let results = three_point_retriever().retrieve(&[0.0, 0.0], 3, None, Some(0.5)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record_id, 0);
    }

    #[test]
    fn predicate_filters_after_overfetch() {
        let wind = Predicate::new().equals("source_type", "wind");
        let results = three_point_retriever().retrieve(&[2.0, 0.0], 2, Some(&wind), None).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.attributes["source_type"].as_str() == Some("wind")));
        assert_eq!(results[0].rank, 1);
    }

    #[test]
    fn not_ready_and_dimension_errors() {
        let retriever = HybridRetriever::default();
        assert!(matches!(retriever.retrieve(&[0.0], 1, None, None), Err(Error::IndexNotReady)));
        assert!(matches!(retriever.insert(vec![]), Err(Error::IndexNotReady)));
        let ready = three_point_retriever();
        assert!(matches!(ready.retrieve(&[0.0, 0.0, 0.0], 1, None, None), Err(Error::DimensionMismatch { expected: 2, actual: 3 })));
    }

    #[test]
    fn non_finite_query_is_rejected() {
        let retriever = three_point_retriever();
        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            assert!(matches!(retriever.retrieve(&[bad, 0.0], 3, None, None), Err(Error::InvalidRecord(_))));
        }
    }

    #[test]
    fn far_apart_vectors_still_score_positive() {
        let retriever = HybridRetriever::default();
        retriever.build(IndexStrategy::Exact, 2, "test").unwrap();
        retriever.insert(vec![(vec![1e20, 0.0], attrs(1, "wind")), (vec![0.0, 0.0], attrs(2, "solar"))]).unwrap();
        let results = retriever.retrieve(&[-1e20, 0.0], 2, None, None).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.similarity_score > 0.0 && r.similarity_score <= 1.0));
    }

    #[test]
    fn empty_index_yields_nothing() {
        let retriever = HybridRetriever::default();
        retriever.build(IndexStrategy::Exact, 2, "test").unwrap();
        assert!(retriever.retrieve(&[1.0, 1.0], 5, None, None).unwrap().is_empty());
    }
}
