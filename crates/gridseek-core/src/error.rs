use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid dimension, strategy or parameters at build time.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index not ready: build or load an index before querying")]
    IndexNotReady,

    /// Persisted index cannot serve the configured embedder; requires a full reindex.
    #[error("Incompatible index: {0}")]
    IncompatibleIndex(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
