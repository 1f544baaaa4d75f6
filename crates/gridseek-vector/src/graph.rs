//! Hierarchical navigable small-world graph.
//!
//! Node levels are drawn from a generator seeded with `seed ^ slot`, so the
//! same insert sequence always yields the same graph.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use gridseek_core::error::{Error, Result};
use gridseek_core::types::RecordId;

use crate::codec::{BlobReader, BlobWriter};
use crate::distance::{l2_squared, select_top_k, Neighbor};
use crate::storage::VectorStore;
use crate::strategy::GraphParams;

const MAX_LEVEL: usize = 16;
const NO_ENTRY: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub struct GraphIndex {
    params: GraphParams,
    store: VectorStore,
    /// `links[slot][layer]` = neighbor slots of `slot` on `layer`.
    links: Vec<Vec<Vec<u32>>>,
    entry: Option<u32>,
    max_level: usize,
}

impl GraphIndex {
    pub fn new(dim: usize, params: GraphParams) -> Self {
        Self { params, store: VectorStore::new(dim), links: Vec::new(), entry: None, max_level: 0 }
    }

    pub fn store(&self) -> &VectorStore { &self.store }
    pub fn params(&self) -> &GraphParams { &self.params }

    pub fn add(&mut self, ids: &[RecordId], vectors: &[Vec<f32>]) {
        for (id, v) in ids.iter().zip(vectors) {
            let slot = self.store.push(*id, v);
            self.link(slot as u32);
        }
    }

    fn max_links(&self, layer: usize) -> usize { if layer == 0 { self.params.m * 2 } else { self.params.m } }

    fn random_level(&self, slot: u32) -> usize {
        let mut rng = StdRng::seed_from_u64(self.params.seed ^ u64::from(slot));
        let ml = 1.0 / (self.params.m as f64).ln();
        let r: f64 = rng.gen();
        ((-(1.0 - r).ln() * ml).floor() as usize).min(MAX_LEVEL)
    }

    fn dist(&self, a: u32, query: &[f32]) -> f32 { self.store.distance_to(a as usize, query) }

    /// Beam search on one layer. Returned neighbors carry slots in `id`,
    /// nearest first.
    fn search_layer(&self, query: &[f32], entry_points: &[u32], ef: usize, layer: usize) -> Vec<Neighbor> {
        let mut visited: HashSet<u32> = entry_points.iter().copied().collect();
        let mut candidates: BinaryHeap<Reverse<Neighbor>> = BinaryHeap::new();
        let mut found: BinaryHeap<Neighbor> = BinaryHeap::new();
        for &ep in entry_points {
            let n = Neighbor::new(u64::from(ep), self.dist(ep, query));
            candidates.push(Reverse(n));
            found.push(n);
        }
        while let Some(Reverse(current)) = candidates.pop() {
            if let Some(worst) = found.peek() {
                if current.distance > worst.distance && found.len() >= ef { break; }
            }
            let Some(neighbors) = self.links[current.id as usize].get(layer) else { continue };
            for &next in neighbors {
                if !visited.insert(next) { continue; }
                let n = Neighbor::new(u64::from(next), self.dist(next, query));
                let admit = found.len() < ef || found.peek().map_or(true, |w| n.distance < w.distance);
                if admit {
                    candidates.push(Reverse(n));
                    found.push(n);
                    if found.len() > ef { found.pop(); }
                }
            }
        }
        found.into_sorted_vec()
    }

    fn descend(&self, query: &[f32], from_level: usize, to_level: usize) -> u32 {
        let mut ep = self.entry.unwrap_or(0);
        for layer in (to_level..=from_level).rev() {
            if let Some(best) = self.search_layer(query, &[ep], 1, layer).first() { ep = best.id as u32; }
        }
        ep
    }

    fn link(&mut self, slot: u32) {
        let level = self.random_level(slot);
        self.links.push(vec![Vec::new(); level + 1]);
        if self.entry.is_none() {
            self.entry = Some(slot);
            self.max_level = level;
            return;
        }
        let query = self.store.vector(slot as usize).to_vec();
        let mut entry_points = vec![if level < self.max_level { self.descend(&query, self.max_level, level + 1) } else { self.entry.unwrap_or(0) }];
        for layer in (0..=level.min(self.max_level)).rev() {
            let found = self.search_layer(&query, &entry_points, self.params.ef_construction, layer);
            let chosen: Vec<u32> = found.iter().take(self.params.m).map(|n| n.id as u32).collect();
            for &peer in &chosen {
                self.links[peer as usize][layer].push(slot);
                if self.links[peer as usize][layer].len() > self.max_links(layer) { self.prune(peer, layer); }
            }
            self.links[slot as usize][layer] = chosen;
            entry_points = found.iter().map(|n| n.id as u32).collect();
        }
        if level > self.max_level {
            self.entry = Some(slot);
            self.max_level = level;
        }
    }

    /// Keep only the closest `max_links(layer)` neighbors of `slot`.
    fn prune(&mut self, slot: u32, layer: usize) {
        let base = self.store.vector(slot as usize);
        let mut scored: Vec<Neighbor> = self.links[slot as usize][layer]
            .iter()
            .map(|&p| Neighbor::new(u64::from(p), l2_squared(base, self.store.vector(p as usize))))
            .collect();
        scored.sort_unstable();
        scored.truncate(self.max_links(layer));
        self.links[slot as usize][layer] = scored.into_iter().map(|n| n.id as u32).collect();
    }

    pub fn search(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        if self.store.is_empty() || k == 0 { return vec![]; }
        let ep = if self.max_level > 0 { self.descend(query, self.max_level, 1) } else { self.entry.unwrap_or(0) };
        let ef = self.params.ef_search.max(k);
        let hits: Vec<Neighbor> = self
            .search_layer(query, &[ep], ef, 0)
            .into_iter()
            .map(|n| Neighbor::new(self.store.id(n.id as usize), n.distance))
            .collect();
        let top = select_top_k(hits, k);
        if top.len() < k.min(self.store.len()) {
            tracing::debug!(found = top.len(), k, "graph search came up short, scanning exhaustively");
            return select_top_k(self.store.scan(query), k);
        }
        top
    }

    pub(crate) fn encode_section(&self, w: &mut BlobWriter) {
        w.put_u32(self.entry.unwrap_or(NO_ENTRY));
        w.put_u32(self.max_level as u32);
        for layers in &self.links {
            w.put_u8(layers.len() as u8);
            for layer in layers { w.put_slots(layer); }
        }
    }

    pub(crate) fn decode_section(store: VectorStore, params: GraphParams, r: &mut BlobReader<'_>) -> Result<Self> {
        let entry = match r.get_u32()? {
            NO_ENTRY => None,
            e if (e as usize) < store.len() => Some(e),
            e => return Err(Error::IncompatibleIndex(format!("graph entry point {} out of range", e))),
        };
        let max_level = r.get_u32()? as usize;
        let mut links = Vec::with_capacity(store.len());
        for _ in 0..store.len() {
            let depth = r.get_u8()? as usize;
            if depth == 0 || depth > MAX_LEVEL + 1 {
                return Err(Error::IncompatibleIndex(format!("graph node has {} layers", depth)));
            }
            let mut layers = Vec::with_capacity(depth);
            for _ in 0..depth {
                let layer = r.get_slots()?;
                if layer.iter().any(|s| *s as usize >= store.len()) {
                    return Err(Error::IncompatibleIndex("graph link references a missing vector".into()));
                }
                layers.push(layer);
            }
            links.push(layers);
        }
        if entry.is_none() != store.is_empty() {
            return Err(Error::IncompatibleIndex("graph entry point does not match vector count".into()));
        }
        Ok(Self { params, store, links, entry, max_level })
    }
}
