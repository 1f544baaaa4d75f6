//! Embedders selected by `[embedding].model`.
//!
//! `hashing` (default): `HashingEmbedder` projects word and character-trigram
//! features into a fixed number of buckets with signed feature hashing, then
//! L2-normalizes. It needs no model files and returns identical vectors for
//! identical text.
//!
//! `bge-m3`: `BgeEmbedder`, the XLM-RoBERTa sentence model on candle. Built
//! only with the `candle` feature (`metal` adds the Apple GPU backend).

use anyhow::{anyhow, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use twox_hash::XxHash64;

use gridseek_core::traits::Embedder;

#[cfg(feature = "candle")]
pub mod device;
#[cfg(feature = "candle")]
pub mod model;
pub mod pool;
pub mod tokenize;

#[cfg(feature = "candle")]
pub use model::BgeEmbedder;

pub use pool::{l2_norm, l2_normalize};
pub use tokenize::{char_trigrams, tokenize};

pub const DEFAULT_DIMENSION: usize = 384;
pub const DEFAULT_MODEL_DIR: &str = "models/bge-m3";
pub const DEFAULT_MAX_TOKENS: usize = 256;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// `[embedding]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedSettings {
    pub model: String,
    /// Hashing only; model embedders report their own width.
    pub dimension: usize,
    pub seed: u64,
    /// Local model files; `~` and `${VAR}` are expanded.
    pub model_dir: Option<String>,
    pub max_tokens: usize,
}

impl Default for EmbedSettings {
    fn default() -> Self {
        Self {
            model: "hashing".to_string(),
            dimension: DEFAULT_DIMENSION,
            seed: 0,
            model_dir: None,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl EmbedSettings {
    pub fn model_path(&self) -> std::path::PathBuf {
        gridseek_core::config::expand_path(self.model_dir.as_deref().unwrap_or(DEFAULT_MODEL_DIR))
    }
}

#[derive(Debug, Clone)]
pub struct HashingEmbedder { dim: usize, seed: u64 }

impl HashingEmbedder {
    pub fn new(dim: usize, seed: u64) -> Result<Self> {
        if dim == 0 { return Err(anyhow!("embedding dimension must be > 0")); }
        Ok(Self { dim, seed })
    }

    fn add_feature(&self, v: &mut [f32], feature: &str, weight: f32) {
        let mut hasher = XxHash64::with_seed(self.seed);
        hasher.write(feature.as_bytes());
        let h = hasher.finish();
        let idx = (h % self.dim as u64) as usize;
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        v[idx] += sign * weight;
    }
}

impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embedder_id(&self) -> String { format!("hashing:d{}:s{}", self.dim, self.seed) }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0f32; self.dim];
        for token in tokenize(text) {
            self.add_feature(&mut v, &token, 1.0);
            for gram in char_trigrams(&token) { self.add_feature(&mut v, &gram, TRIGRAM_WEIGHT); }
        }
        l2_normalize(&mut v);
        Ok(v)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.par_iter().map(|t| self.embed(t)).collect()
    }
}

pub fn get_default_embedder(settings: &EmbedSettings) -> Result<Box<dyn Embedder>> {
    match settings.model.as_str() {
        "hashing" => {
            tracing::info!(dim = settings.dimension, seed = settings.seed, "using hashing embedder");
            Ok(Box::new(HashingEmbedder::new(settings.dimension, settings.seed)?))
        }
        "bge-m3" | "bge" => load_model(settings),
        other => Err(anyhow!("unsupported embedding model '{}'", other)),
    }
}

#[cfg(feature = "candle")]
fn load_model(settings: &EmbedSettings) -> Result<Box<dyn Embedder>> {
    Ok(Box::new(BgeEmbedder::load(&settings.model_path(), settings.max_tokens)?))
}

#[cfg(not(feature = "candle"))]
fn load_model(settings: &EmbedSettings) -> Result<Box<dyn Embedder>> {
    Err(anyhow!("embedding model '{}' needs gridseek-embed built with the `candle` feature", settings.model))
}
