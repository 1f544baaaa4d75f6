//! Vector index, attribute table and their on-disk pair.

pub mod codec;
pub mod distance;
pub mod flat;
pub mod graph;
pub mod index;
pub mod ivf;
pub mod metadata;
pub mod persist;
pub mod record_index;
pub mod storage;
pub mod strategy;

pub use distance::Neighbor;
pub use index::VectorIndex;
pub use metadata::MetadataStore;
pub use persist::IndexManifest;
pub use record_index::{IndexStatistics, RecordIndex};
pub use strategy::{GraphParams, IndexStrategy, PartitionParams, StrategyKind, StrategyPolicy};
