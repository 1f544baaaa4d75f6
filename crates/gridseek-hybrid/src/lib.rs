//! Retrieval on top of the vector index: widened search, attribute filters,
//! score normalization, boosts and grouping.

pub mod aggregate;
pub mod rerank;
pub mod retriever;
pub mod scoring;
pub mod session;

pub use aggregate::{aggregate, GroupSummary, UNKNOWN_GROUP};
pub use rerank::apply_boosts;
pub use retriever::{HybridRetriever, RetrieverOptions, DEFAULT_OVERFETCH_FACTOR};
pub use scoring::ScoreNormalizer;
pub use session::{OpenOutcome, RetrievalSession, RetrievalSettings};
