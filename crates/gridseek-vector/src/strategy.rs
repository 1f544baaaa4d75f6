//! Index strategies and the corpus-size selection policy.
//!
//! Strategy choice happens once, at build time, from the number of records
//! about to be inserted. Parameters travel with the variant and are persisted
//! in the index manifest.

use serde::{Deserialize, Serialize};

use gridseek_core::error::{Error, Result};

/// Floor for the auto-reduced partition count.
pub const MIN_PARTITIONS: usize = 1;
/// Training vectors required per partition before the requested count is honored.
pub const VECTORS_PER_PARTITION: usize = 10;
pub const MAX_PARTITIONS: usize = 65_536;

pub const DEFAULT_EXACT_THRESHOLD: usize = 10_000;
pub const DEFAULT_GRAPH_THRESHOLD: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Exact,
    Partitioned,
    Graph,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Partitioned => "partitioned",
            Self::Graph => "graph",
        }
    }

    pub(crate) fn tag(&self) -> u8 {
        match self {
            Self::Exact => 0,
            Self::Partitioned => 1,
            Self::Graph => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Exact),
            1 => Some(Self::Partitioned),
            2 => Some(Self::Graph),
            _ => None,
        }
    }
}

/// Inverted-file parameters. `partitions` is the requested count; training
/// may reduce it, see [`effective_partitions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionParams {
    pub partitions: usize,
    pub probes: usize,
    pub max_iterations: usize,
    pub min_partitions: usize,
    pub vectors_per_partition: usize,
    pub seed: u64,
}

impl Default for PartitionParams {
    fn default() -> Self {
        Self {
            partitions: 100,
            probes: 10,
            max_iterations: 25,
            min_partitions: MIN_PARTITIONS,
            vectors_per_partition: VECTORS_PER_PARTITION,
            seed: 42,
        }
    }
}

/// Proximity-graph parameters: `m` links per node on upper layers (`2m` on
/// the base layer), beam widths for construction and search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphParams {
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub seed: u64,
}

impl Default for GraphParams {
    fn default() -> Self { Self { m: 32, ef_construction: 200, ef_search: 64, seed: 42 } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum IndexStrategy {
    Exact,
    Partitioned(PartitionParams),
    Graph(GraphParams),
}

impl IndexStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Exact => StrategyKind::Exact,
            Self::Partitioned(_) => StrategyKind::Partitioned,
            Self::Graph(_) => StrategyKind::Graph,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Exact => Ok(()),
            Self::Partitioned(p) => {
                if p.partitions == 0 { return Err(Error::Config("partitions must be > 0".into())); }
                if p.probes == 0 { return Err(Error::Config("probes must be > 0".into())); }
                if p.max_iterations == 0 { return Err(Error::Config("max_iterations must be > 0".into())); }
                if p.min_partitions == 0 { return Err(Error::Config("min_partitions must be > 0".into())); }
                if p.vectors_per_partition == 0 { return Err(Error::Config("vectors_per_partition must be > 0".into())); }
                Ok(())
            }
            Self::Graph(g) => {
                if g.m < 2 { return Err(Error::Config(format!("graph degree m must be >= 2, got {}", g.m))); }
                if g.ef_construction == 0 || g.ef_search == 0 { return Err(Error::Config("ef parameters must be > 0".into())); }
                Ok(())
            }
        }
    }
}

/// `max(min_partitions, min(requested, n_vectors / vectors_per_partition))`,
/// never more partitions than training vectors.
pub fn effective_partitions(requested: usize, n_vectors: usize, min_partitions: usize, vectors_per_partition: usize) -> usize {
    let by_size = n_vectors / vectors_per_partition.max(1);
    let effective = requested.min(by_size).max(min_partitions.max(1));
    effective.min(n_vectors.max(1))
}

/// `[index]` config section: size thresholds plus default parameters.
/// `strategy` pins a strategy regardless of corpus size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyPolicy {
    pub strategy: Option<StrategyKind>,
    pub exact_threshold: usize,
    pub graph_threshold: usize,
    pub partitions: usize,
    pub probes: usize,
    pub max_iterations: usize,
    pub min_partitions: usize,
    pub vectors_per_partition: usize,
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub seed: u64,
}

impl Default for StrategyPolicy {
    fn default() -> Self {
        let p = PartitionParams::default();
        let g = GraphParams::default();
        Self {
            strategy: None,
            exact_threshold: DEFAULT_EXACT_THRESHOLD,
            graph_threshold: DEFAULT_GRAPH_THRESHOLD,
            partitions: p.partitions,
            probes: p.probes,
            max_iterations: p.max_iterations,
            min_partitions: p.min_partitions,
            vectors_per_partition: p.vectors_per_partition,
            m: g.m,
            ef_construction: g.ef_construction,
            ef_search: g.ef_search,
            seed: p.seed,
        }
    }
}

impl StrategyPolicy {
    pub fn select(&self, corpus_size: usize) -> IndexStrategy {
        let kind = self.strategy.unwrap_or(if corpus_size < self.exact_threshold {
            StrategyKind::Exact
        } else if corpus_size < self.graph_threshold {
            StrategyKind::Partitioned
        } else {
            StrategyKind::Graph
        });
        match kind {
            StrategyKind::Exact => IndexStrategy::Exact,
            StrategyKind::Partitioned => IndexStrategy::Partitioned(self.partition_params(corpus_size)),
            StrategyKind::Graph => IndexStrategy::Graph(self.graph_params()),
        }
    }

    /// Requested partitions grow with `2 * sqrt(n)` past the configured count.
    pub fn partition_params(&self, corpus_size: usize) -> PartitionParams {
        let sqrt_n = (corpus_size as f64).sqrt() as usize;
        let partitions = self.partitions.max(2 * sqrt_n).min(MAX_PARTITIONS);
        PartitionParams {
            partitions,
            probes: self.probes,
            max_iterations: self.max_iterations,
            min_partitions: self.min_partitions,
            vectors_per_partition: self.vectors_per_partition,
            seed: self.seed,
        }
    }

    pub fn graph_params(&self) -> GraphParams {
        GraphParams { m: self.m, ef_construction: self.ef_construction, ef_search: self.ef_search, seed: self.seed }
    }
}
