use crate::types::SourceRecord;

/// Text -> dense vector. Deterministic for a fixed model version; `dim` is
/// fixed for the lifetime of the embedder.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    /// Stable identity of the model/configuration, recorded next to persisted indexes.
    fn embedder_id(&self) -> String;
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Supplies `(text_for_embedding, attributes)` pairs, one per source record.
pub trait RecordSource: Send + Sync {
    fn records(&self) -> anyhow::Result<Vec<SourceRecord>>;
}
