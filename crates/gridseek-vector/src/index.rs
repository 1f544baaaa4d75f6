//! Strategy-polymorphic vector index.

use gridseek_core::error::{Error, Result};
use gridseek_core::types::RecordId;

use crate::codec::{BlobReader, BlobWriter};
use crate::distance::Neighbor;
use crate::flat::ExactIndex;
use crate::graph::GraphIndex;
use crate::ivf::PartitionedIndex;
use crate::storage::VectorStore;
use crate::strategy::{IndexStrategy, StrategyKind};

const MAGIC: &[u8; 4] = b"GSIX";
pub const BLOB_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub enum VectorIndex {
    Exact(ExactIndex),
    Partitioned(PartitionedIndex),
    Graph(GraphIndex),
}

impl VectorIndex {
    /// Empty index of the given strategy. Fails with `Config` on a zero
    /// dimension or invalid strategy parameters.
    pub fn build(strategy: IndexStrategy, dim: usize) -> Result<Self> {
        if dim == 0 { return Err(Error::Config("index dimension must be > 0".into())); }
        strategy.validate()?;
        Ok(match strategy {
            IndexStrategy::Exact => Self::Exact(ExactIndex::new(dim)),
            IndexStrategy::Partitioned(p) => Self::Partitioned(PartitionedIndex::new(dim, p)),
            IndexStrategy::Graph(g) => Self::Graph(GraphIndex::new(dim, g)),
        })
    }

    fn store(&self) -> &VectorStore {
        match self {
            Self::Exact(i) => i.store(),
            Self::Partitioned(i) => i.store(),
            Self::Graph(i) => i.store(),
        }
    }

    pub fn len(&self) -> usize { self.store().len() }
    pub fn is_empty(&self) -> bool { self.store().is_empty() }
    pub fn dimension(&self) -> usize { self.store().dim() }

    pub fn strategy(&self) -> IndexStrategy {
        match self {
            Self::Exact(_) => IndexStrategy::Exact,
            Self::Partitioned(i) => IndexStrategy::Partitioned(*i.params()),
            Self::Graph(i) => IndexStrategy::Graph(*i.params()),
        }
    }

    /// Trained partition count for partitioned indexes.
    pub fn effective_partitions(&self) -> Option<usize> {
        match self {
            Self::Partitioned(i) => i.effective_partitions(),
            _ => None,
        }
    }

    /// Insert a batch. The whole batch is validated first, so a rejected batch
    /// leaves the index untouched.
    pub fn insert_all(&mut self, vectors: &[Vec<f32>], ids: &[RecordId]) -> Result<()> {
        if vectors.len() != ids.len() {
            return Err(Error::InvalidRecord(format!("{} vectors but {} ids", vectors.len(), ids.len())));
        }
        let dim = self.dimension();
        for (v, id) in vectors.iter().zip(ids) {
            if v.len() != dim { return Err(Error::DimensionMismatch { expected: dim, actual: v.len() }); }
            if v.iter().any(|x| !x.is_finite()) {
                return Err(Error::InvalidRecord(format!("vector for record {} has non-finite components", id)));
            }
        }
        if u32::try_from(self.len() + vectors.len()).is_err() {
            return Err(Error::Operation("index capacity exceeded".into()));
        }
        match self {
            Self::Exact(i) => i.add(ids, vectors),
            Self::Partitioned(i) => i.add(ids, vectors),
            Self::Graph(i) => i.add(ids, vectors),
        }
        Ok(())
    }

    /// Up to `k` nearest `(id, squared distance)` pairs, nearest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension() {
            return Err(Error::DimensionMismatch { expected: self.dimension(), actual: query.len() });
        }
        Ok(match self {
            Self::Exact(i) => i.search(query, k),
            Self::Partitioned(i) => i.search(query, k),
            Self::Graph(i) => i.search(query, k),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let store = self.store();
        let mut w = BlobWriter::new();
        w.put_bytes(MAGIC);
        w.put_u32(BLOB_VERSION);
        w.put_u8(self.strategy().kind().tag());
        w.put_u32(store.dim() as u32);
        w.put_usize(store.len());
        w.put_u64s(store.ids());
        w.put_f32s(store.data());
        match self {
            Self::Exact(_) => {}
            Self::Partitioned(i) => i.encode_section(&mut w),
            Self::Graph(i) => i.encode_section(&mut w),
        }
        w.finish()
    }

    /// Decode a blob written by [`VectorIndex::encode`]. Strategy parameters
    /// come from the manifest; the blob must agree on the strategy kind.
    pub fn decode(bytes: &[u8], strategy: IndexStrategy) -> Result<Self> {
        let mut r = BlobReader::new(bytes);
        if r.get_bytes(MAGIC.len())? != MAGIC {
            return Err(Error::IncompatibleIndex("not a gridseek index blob".into()));
        }
        let version = r.get_u32()?;
        if version != BLOB_VERSION {
            return Err(Error::IncompatibleIndex(format!("index blob version {} (expected {})", version, BLOB_VERSION)));
        }
        let kind = StrategyKind::from_tag(r.get_u8()?).ok_or_else(|| Error::IncompatibleIndex("unknown strategy tag".into()))?;
        if kind != strategy.kind() {
            return Err(Error::IncompatibleIndex(format!("blob holds a {} index, manifest says {}", kind.as_str(), strategy.kind().as_str())));
        }
        let dim = r.get_u32()? as usize;
        if dim == 0 { return Err(Error::IncompatibleIndex("index blob has zero dimension".into())); }
        let count = r.get_usize()?;
        let ids = r.get_u64s(count)?;
        let data = r.get_f32s(count.checked_mul(dim).ok_or_else(|| Error::IncompatibleIndex("vector section too large".into()))?)?;
        let store = VectorStore::from_parts(dim, ids, data);
        let index = match strategy {
            IndexStrategy::Exact => Self::Exact(ExactIndex::from_store(store)),
            IndexStrategy::Partitioned(p) => Self::Partitioned(PartitionedIndex::decode_section(store, p, &mut r)?),
            IndexStrategy::Graph(g) => Self::Graph(GraphIndex::decode_section(store, g, &mut r)?),
        };
        if !r.is_exhausted() { return Err(Error::IncompatibleIndex("trailing bytes after index blob".into())); }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{GraphParams, PartitionParams};

    fn sample() -> (Vec<Vec<f32>>, Vec<RecordId>) {
        (vec![vec![0.0, 0.0], vec![2.0, 0.0], vec![3.0, 1.0]], vec![1, 2, 3])
    }

    #[test]
    fn exact_distances_are_squared_l2() {
        let (v, ids) = sample();
        let mut index = VectorIndex::build(IndexStrategy::Exact, 2).unwrap();
        index.insert_all(&v, &ids).unwrap();
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        let distances: Vec<f32> = hits.iter().map(|n| n.distance).collect();
        assert_eq!(distances, vec![0.0, 4.0, 10.0]);
    }

    #[test]
    fn rejects_bad_batches_without_mutating() {
        let mut index = VectorIndex::build(IndexStrategy::Exact, 2).unwrap();
        let err = index.insert_all(&[vec![1.0, 2.0], vec![1.0]], &[1, 2]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 1 }));
        assert!(matches!(index.insert_all(&[vec![f32::NAN, 0.0]], &[1]), Err(Error::InvalidRecord(_))));
        assert!(matches!(index.insert_all(&[vec![0.0, 0.0]], &[1, 2]), Err(Error::InvalidRecord(_))));
        assert!(index.is_empty());
        assert!(matches!(index.search(&[0.0], 1), Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn build_validates_configuration() {
        assert!(matches!(VectorIndex::build(IndexStrategy::Exact, 0), Err(Error::Config(_))));
        let bad = IndexStrategy::Partitioned(PartitionParams { probes: 0, ..PartitionParams::default() });
        assert!(matches!(VectorIndex::build(bad, 4), Err(Error::Config(_))));
    }

    #[test]
    fn empty_index_search_is_empty() {
        for strategy in [IndexStrategy::Exact, IndexStrategy::Partitioned(PartitionParams::default()), IndexStrategy::Graph(GraphParams::default())] {
            let index = VectorIndex::build(strategy, 3).unwrap();
            assert!(index.search(&[0.0, 0.0, 0.0], 5).unwrap().is_empty());
        }
    }

    #[test]
    fn blob_strategy_must_match_manifest() {
        let (v, ids) = sample();
        let mut index = VectorIndex::build(IndexStrategy::Exact, 2).unwrap();
        index.insert_all(&v, &ids).unwrap();
        let blob = index.encode();
        assert!(matches!(VectorIndex::decode(&blob, IndexStrategy::Graph(GraphParams::default())), Err(Error::IncompatibleIndex(_))));
        assert!(matches!(VectorIndex::decode(&blob[..blob.len() - 3], IndexStrategy::Exact), Err(Error::IncompatibleIndex(_))));
        assert_eq!(VectorIndex::decode(&blob, IndexStrategy::Exact).unwrap().len(), 3);
    }
}
