//! Inverted-file index: k-means coarse quantizer plus per-partition lists.
//!
//! The quantizer is trained on the first non-empty batch. When that batch is
//! too small for the requested partition count, the count is reduced (see
//! `strategy::effective_partitions`) instead of failing. Later batches are
//! assigned to the existing centroids without retraining.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use gridseek_core::error::{Error, Result};
use gridseek_core::types::RecordId;

use crate::codec::{BlobReader, BlobWriter};
use crate::distance::{l2_squared, select_top_k, Neighbor};
use crate::storage::VectorStore;
use crate::strategy::{effective_partitions, PartitionParams};

/// Training sample cap per centroid.
const MAX_TRAINING_POINTS_PER_PARTITION: usize = 256;

#[derive(Debug, Clone)]
pub struct PartitionedIndex {
    params: PartitionParams,
    store: VectorStore,
    /// `nlist * dim` centroid coordinates; empty until trained.
    centroids: Vec<f32>,
    lists: Vec<Vec<u32>>,
}

impl PartitionedIndex {
    pub fn new(dim: usize, params: PartitionParams) -> Self {
        Self { params, store: VectorStore::new(dim), centroids: Vec::new(), lists: Vec::new() }
    }

    pub fn store(&self) -> &VectorStore { &self.store }
    pub fn params(&self) -> &PartitionParams { &self.params }
    pub fn is_trained(&self) -> bool { !self.lists.is_empty() }

    /// Partition count actually trained; `None` before the first insert.
    pub fn effective_partitions(&self) -> Option<usize> { self.is_trained().then_some(self.lists.len()) }

    /// Probes used per query: `min(probes, effective_partitions)`.
    pub fn effective_probes(&self) -> usize { self.params.probes.min(self.lists.len()).max(1) }

    pub fn add(&mut self, ids: &[RecordId], vectors: &[Vec<f32>]) {
        if vectors.is_empty() { return; }
        if !self.is_trained() { self.train(vectors); }
        let assignments: Vec<usize> = vectors.par_iter().map(|v| self.nearest_centroid(v)).collect();
        for ((id, v), list) in ids.iter().zip(vectors).zip(assignments) {
            let slot = self.store.push(*id, v);
            self.lists[list].push(slot as u32);
        }
    }

    fn centroid(&self, i: usize) -> &[f32] {
        let dim = self.store.dim();
        &self.centroids[i * dim..(i + 1) * dim]
    }

    fn nearest_centroid(&self, v: &[f32]) -> usize {
        nearest(&self.centroids, self.store.dim(), v).0
    }

    fn train(&mut self, vectors: &[Vec<f32>]) {
        let p = self.params;
        let nlist = effective_partitions(p.partitions, vectors.len(), p.min_partitions, p.vectors_per_partition);
        if nlist < p.partitions {
            tracing::warn!(
                requested = p.partitions,
                effective = nlist,
                training_vectors = vectors.len(),
                "reducing partition count for small training set"
            );
        }
        let mut rng = StdRng::seed_from_u64(p.seed);
        let cap = nlist.saturating_mul(MAX_TRAINING_POINTS_PER_PARTITION);
        let sample: Vec<&[f32]> = if vectors.len() > cap {
            let mut idx: Vec<usize> = (0..vectors.len()).collect();
            idx.shuffle(&mut rng);
            idx.truncate(cap);
            idx.sort_unstable();
            idx.into_iter().map(|i| vectors[i].as_slice()).collect()
        } else {
            vectors.iter().map(Vec::as_slice).collect()
        };
        self.centroids = kmeans(&sample, self.store.dim(), nlist, p.max_iterations, &mut rng);
        self.lists = vec![Vec::new(); nlist];
        tracing::debug!(nlist, sample = sample.len(), "trained coarse quantizer");
    }

    pub fn search(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        if self.store.is_empty() || k == 0 { return vec![]; }
        let mut order: Vec<Neighbor> =
            (0..self.lists.len()).map(|i| Neighbor::new(i as u64, l2_squared(self.centroid(i), query))).collect();
        order.sort_unstable();
        let wanted = k.min(self.store.len());
        let mut candidates = Vec::new();
        for (probed, list) in order.iter().enumerate() {
            // keep probing past nprobe until k candidates are in hand
            if probed >= self.effective_probes() && candidates.len() >= wanted { break; }
            candidates.extend(self.store.scan_slots(query, &self.lists[list.id as usize]));
        }
        select_top_k(candidates, k)
    }

    pub(crate) fn encode_section(&self, w: &mut BlobWriter) {
        w.put_u32(self.lists.len() as u32);
        w.put_f32s(&self.centroids);
        for list in &self.lists { w.put_slots(list); }
    }

    pub(crate) fn decode_section(store: VectorStore, params: PartitionParams, r: &mut BlobReader<'_>) -> Result<Self> {
        let nlist = r.get_u32()? as usize;
        let centroids = r.get_f32s(nlist * store.dim())?;
        let mut lists = Vec::with_capacity(nlist);
        let mut assigned = 0usize;
        for _ in 0..nlist {
            let list = r.get_slots()?;
            if list.iter().any(|s| *s as usize >= store.len()) {
                return Err(Error::IncompatibleIndex("partition list references a missing vector".into()));
            }
            assigned += list.len();
            lists.push(list);
        }
        if assigned != store.len() {
            return Err(Error::IncompatibleIndex(format!("partition lists hold {} of {} vectors", assigned, store.len())));
        }
        Ok(Self { params, store, centroids, lists })
    }
}

/// Index and distance of the closest centroid in a flat `k * dim` buffer.
fn nearest(centroids: &[f32], dim: usize, v: &[f32]) -> (usize, f32) {
    centroids
        .chunks(dim)
        .enumerate()
        .map(|(i, c)| (i, l2_squared(c, v)))
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
        .unwrap_or((0, f32::INFINITY))
}

/// k-means++ seeding followed by Lloyd iterations. Empty clusters keep their
/// previous centroid.
fn kmeans(points: &[&[f32]], dim: usize, k: usize, max_iterations: usize, rng: &mut StdRng) -> Vec<f32> {
    let mut centroids = Vec::with_capacity(k * dim);
    centroids.extend_from_slice(points[rng.gen_range(0..points.len())]);
    let mut d2: Vec<f32> = points.par_iter().map(|p| l2_squared(p, &centroids[..dim])).collect();
    for _ in 1..k {
        let total: f64 = d2.iter().map(|d| *d as f64).sum();
        let pick = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = points.len() - 1;
            for (i, d) in d2.iter().enumerate() {
                target -= *d as f64;
                if target <= 0.0 { chosen = i; break; }
            }
            chosen
        } else {
            rng.gen_range(0..points.len())
        };
        let start = centroids.len();
        centroids.extend_from_slice(points[pick]);
        let newest = centroids[start..].to_vec();
        d2.par_iter_mut().zip(points.par_iter()).for_each(|(d, p)| *d = d.min(l2_squared(p, &newest)));
    }

    let mut assignment = vec![usize::MAX; points.len()];
    for iteration in 0..max_iterations {
        let next: Vec<usize> = points.par_iter().map(|p| nearest(&centroids, dim, p).0).collect();
        let changed = next.iter().zip(&assignment).filter(|(a, b)| a != b).count();
        assignment = next;
        let mut sums = vec![0f64; k * dim];
        let mut counts = vec![0usize; k];
        for (p, c) in points.iter().zip(&assignment) {
            counts[*c] += 1;
            for (s, x) in sums[c * dim..(c + 1) * dim].iter_mut().zip(p.iter()) { *s += *x as f64; }
        }
        for c in 0..k {
            if counts[c] == 0 { continue; }
            for j in 0..dim { centroids[c * dim + j] = (sums[c * dim + j] / counts[c] as f64) as f32; }
        }
        if changed == 0 {
            tracing::trace!(iteration, "k-means converged");
            break;
        }
    }
    centroids
}
