//! Embedding backends.
//!
//! [`LocalEmbedder`] runs a BERT-family sentence embedding model (by default
//! `all-MiniLM-L6-v2`) with candle and mean-pools the last hidden state.
//! [`HashEmbedder`] is a deterministic bag-of-tokens stand-in used for tests
//! and offline development; `APP_USE_FAKE_EMBEDDINGS=1` selects it.

use anyhow::{anyhow, ensure, Result};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;
use twox_hash::XxHash64;

use reportqa_core::config::{expand_path, EmbeddingSettings};
use reportqa_core::traits::Embedder;
use reportqa_core::Error;

pub mod device;
pub mod sentence;
pub mod tokenize;

pub use sentence::sentence_vector;

pub const HASH_EMBEDDING_DIM: usize = 384;

pub struct LocalEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
    dim: usize,
    max_len: usize,
}

impl LocalEmbedder {
    pub fn load(settings: &EmbeddingSettings) -> Result<Self> {
        let device = device::select_device();
        let model_dir = resolve_model_dir(settings.model_dir.as_deref(), &settings.model)?;
        tracing::info!(model = %settings.model, dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw_config: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let dim = raw_config
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| anyhow!("{} has no hidden_size", config_path.display()))? as usize;
        let config: BertConfig = serde_json::from_value(raw_config)?;

        let weights = load_weights(&model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DTYPE, &device);
        let model = BertModel::load(vb, &config)?;
        tracing::info!(dim, "embedding model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            model_id: settings.model.clone(),
            dim,
            max_len: settings.max_tokens,
        })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let (input_ids, attention_mask) =
            tokenize::tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let v: Vec<f32> = sentence_vector(&hidden, &attention_mask)?.squeeze(0)?.to_device(&Device::Cpu)?.to_vec1()?;
        ensure!(v.len() == self.dim, "model returned {} dims, expected {}", v.len(), self.dim);
        Ok(v)
    }
}

impl Embedder for LocalEmbedder {
    fn model_id(&self) -> &str { &self.model_id }
    fn dim(&self) -> usize { self.dim }
    fn embed(&self, text: &str) -> reportqa_core::Result<Vec<f32>> {
        self.embed_text(text).map_err(|e| Error::EmbeddingFailure(format!("{e:#}")))
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let tensors = candle_core::pickle::read_all(&pickle)?;
        return Ok(tensors.into_iter().collect());
    }
    Err(anyhow!("No model.safetensors or pytorch_model.bin in {}", model_dir.display()))
}

/// Deterministic embedder built from hashed lowercase word tokens.
///
/// Texts sharing words land close together, which is enough for retrieval
/// tests without model files.
pub struct HashEmbedder {
    dim: usize,
    model_id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1), model_id: format!("hash:d{}", dim.max(1)) }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self { Self::new(HASH_EMBEDDING_DIM) }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str { &self.model_id }
    fn dim(&self) -> usize { self.dim }
    fn embed(&self, text: &str) -> reportqa_core::Result<Vec<f32>> {
        let mut v = vec![0f32; self.dim];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        Ok(v)
    }
}

fn fake_requested() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Pick the embedder described by `settings`; the hash embedder when
/// `use_fake` is set or `APP_USE_FAKE_EMBEDDINGS` is truthy.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if settings.use_fake || fake_requested() {
        tracing::info!("using HashEmbedder");
        return Ok(Arc::new(HashEmbedder::default()));
    }
    Ok(Arc::new(LocalEmbedder::load(settings)?))
}

fn resolve_model_dir(configured: Option<&str>, model: &str) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let p = expand_path(dir);
        if p.exists() { return Ok(p); }
        return Err(anyhow!("embedding.model_dir {} does not exist", p.display()));
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = expand_path(&dir);
            if p.exists() { tracing::debug!(var, dir = %p.display(), "model dir from env"); return Ok(p); }
        }
    }
    let name = model.rsplit('/').next().unwrap_or(model);
    for root in ["models", "../models"] {
        let p = Path::new(root).join(name);
        if p.exists() { return Ok(p); }
    }
    Err(anyhow!("Could not locate model directory for {}", model))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_configured_dir_is_an_error() {
        let err = resolve_model_dir(Some("/definitely/not/here"), "m").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn hash_embedder_ignores_case_and_punctuation() {
        let e = HashEmbedder::new(64);
        assert_eq!(e.embed("Cancellation rate?").unwrap(), e.embed("cancellation_rate").unwrap());
    }
}
