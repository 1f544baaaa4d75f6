use gridseek_core::types::RecordId;

use crate::distance::{select_top_k, Neighbor};
use crate::storage::VectorStore;

/// Brute-force index: every search scans all stored vectors.
/// Inserting the same id twice stores two entries.
#[derive(Debug, Clone)]
pub struct ExactIndex {
    store: VectorStore,
}

impl ExactIndex {
    pub fn new(dim: usize) -> Self { Self { store: VectorStore::new(dim) } }

    pub fn store(&self) -> &VectorStore { &self.store }

    pub fn add(&mut self, ids: &[RecordId], vectors: &[Vec<f32>]) {
        for (id, v) in ids.iter().zip(vectors) { self.store.push(*id, v); }
    }

    pub fn search(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        if self.store.is_empty() { return vec![]; }
        select_top_k(self.store.scan(query), k)
    }

    pub(crate) fn from_store(store: VectorStore) -> Self { Self { store } }
}
