use rayon::prelude::*;

use gridseek_core::types::RecordId;

use crate::distance::{l2_squared, Neighbor};

/// Scans above this many vectors fan out across the rayon pool.
const PARALLEL_SCAN_THRESHOLD: usize = 4_096;

/// Row-major vector storage: slot `i` holds `ids[i]` and
/// `data[i * dim..(i + 1) * dim]`.
#[derive(Debug, Clone, Default)]
pub struct VectorStore {
    dim: usize,
    ids: Vec<RecordId>,
    data: Vec<f32>,
}

impl VectorStore {
    pub fn new(dim: usize) -> Self { Self { dim, ids: Vec::new(), data: Vec::new() } }

    pub(crate) fn from_parts(dim: usize, ids: Vec<RecordId>, data: Vec<f32>) -> Self { Self { dim, ids, data } }

    pub fn dim(&self) -> usize { self.dim }
    pub fn len(&self) -> usize { self.ids.len() }
    pub fn is_empty(&self) -> bool { self.ids.is_empty() }
    pub fn ids(&self) -> &[RecordId] { &self.ids }
    pub fn data(&self) -> &[f32] { &self.data }

    /// Append a vector, returning its slot.
    pub fn push(&mut self, id: RecordId, vector: &[f32]) -> usize {
        self.ids.push(id);
        self.data.extend_from_slice(vector);
        self.ids.len() - 1
    }

    #[inline]
    pub fn vector(&self, slot: usize) -> &[f32] { &self.data[slot * self.dim..(slot + 1) * self.dim] }

    #[inline]
    pub fn id(&self, slot: usize) -> RecordId { self.ids[slot] }

    #[inline]
    pub fn distance_to(&self, slot: usize, query: &[f32]) -> f32 { l2_squared(self.vector(slot), query) }

    /// Distance from `query` to every stored vector.
    pub fn scan(&self, query: &[f32]) -> Vec<Neighbor> {
        if self.len() >= PARALLEL_SCAN_THRESHOLD {
            self.data
                .par_chunks(self.dim)
                .zip(self.ids.par_iter())
                .map(|(v, id)| Neighbor::new(*id, l2_squared(v, query)))
                .collect()
        } else {
            self.data.chunks(self.dim).zip(&self.ids).map(|(v, id)| Neighbor::new(*id, l2_squared(v, query))).collect()
        }
    }

    /// Distance from `query` to the given slots only.
    pub fn scan_slots(&self, query: &[f32], slots: &[u32]) -> Vec<Neighbor> {
        slots.iter().map(|&s| Neighbor::new(self.id(s as usize), self.distance_to(s as usize, query))).collect()
    }
}
