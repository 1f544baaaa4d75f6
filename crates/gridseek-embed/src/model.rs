//! BGE-M3 (XLM-RoBERTa) sentence embedder on candle, loaded from a local
//! model directory holding `tokenizer.json`, `config.json` and either
//! `model.safetensors` or `pytorch_model.bin`.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use gridseek_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::encode_padded;

const PAD_TOKEN_ID: u32 = 1;
const BATCH_SIZE: usize = 16;

pub struct BgeEmbedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_tokens: usize,
    name: String,
}

impl BgeEmbedder {
    pub fn load(model_dir: &Path, max_tokens: usize) -> Result<Self> {
        if !model_dir.is_dir() { return Err(anyhow!("model directory {} does not exist", model_dir.display())); }
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        let name = model_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "bge".into());
        tracing::info!(model = %name, dim = config.hidden_size, "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim: config.hidden_size, max_tokens: max_tokens.max(2), name })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (ids, mask) = encode_padded(&self.tokenizer, texts, self.max_tokens, PAD_TOKEN_ID)?;
        let shape = (texts.len(), self.max_tokens);
        let input_ids = Tensor::from_vec(ids, shape, &self.device)?;
        let attention_mask = Tensor::from_vec(mask, shape, &self.device)?;
        let token_type_ids = Tensor::zeros(shape, DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        Ok(pooled.to_device(&Device::Cpu)?.to_vec2()?)
    }
}

/// safetensors when present, else the PyTorch pickle.
fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.is_file() { return Ok(candle_core::safetensors::load(&safetensors, device)?); }
    let pickle = model_dir.join("pytorch_model.bin");
    if !pickle.is_file() { return Err(anyhow!("no model weights in {}", model_dir.display())); }
    Ok(candle_core::pickle::read_all(&pickle)?.into_iter().collect())
}

impl Embedder for BgeEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embedder_id(&self) -> String { format!("{}:d{}:t{}", self.name, self.dim, self.max_tokens) }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_chunk(&[text.to_string()])?.pop().ok_or_else(|| anyhow!("model returned no embedding"))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) { out.extend(self.embed_chunk(chunk)?); }
        tracing::debug!(texts = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}
