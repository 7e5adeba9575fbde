//! Embedding providers: the BGE-M3 model on candle and a deterministic
//! hashing embedder for tests and offline runs.

use anyhow::{anyhow, Context};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};
use twox_hash::XxHash64;

use ragchat_core::config::{expand_path, EmbeddingKind, EmbeddingSettings};
use ragchat_core::traits::EmbeddingProvider;
use ragchat_core::{Error, Result};

pub mod device;
pub mod pool;
pub mod tokenize;

pub use pool::masked_mean_l2;

/// BGE-M3 (XLM-RoBERTa) sentence embedder with masked-mean pooling.
pub struct BgeM3Embedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
    dim: usize,
    id: String,
}

impl BgeM3Embedder {
    pub fn load(settings: &EmbeddingSettings) -> Result<Self> {
        Self::load_inner(settings).map_err(|e| Error::retrieval(format!("{e:#}")))
    }

    fn load_inner(settings: &EmbeddingSettings) -> anyhow::Result<Self> {
        let device = device::select_device();
        let model_dir = resolve_model_dir(settings.model_dir.as_deref())?;
        info!(dir = %model_dir.display(), "loading BGE-M3");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("failed to load tokenizer from {}: {e}", tokenizer_path.display()))?;

        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(
            &std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?,
        )?;

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;

        let dim = config.hidden_size;
        if dim != settings.dim {
            warn!(model_dim = dim, configured = settings.dim, "embedding.dim differs from model hidden size");
        }
        info!(dim, "BGE-M3 loaded");
        Ok(Self { model, tokenizer, device, max_len: settings.max_len, dim, id: format!("bge-m3:d{dim}") })
    }

    fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) =
            tokenize::tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = Tensor::zeros((1, self.max_len), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let v: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if v.len() != self.dim {
            return Err(anyhow!("model produced {} dims, expected {}", v.len(), self.dim));
        }
        let ms = start.elapsed().as_millis();
        if ms > 100 {
            debug!(ms, "slow embedding");
        }
        Ok(v)
    }
}

impl EmbeddingProvider for BgeM3Embedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|t| self.embed_one(t).map_err(|e| Error::retrieval(format!("{e:#}"))))
            .collect()
    }
}

/// Token-hashing embedder: deterministic, L2-normalised, no model files.
pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("hash:d{dim}") }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Picks the provider named by `settings`; `APP_USE_FAKE_EMBEDDINGS=1` forces
/// the hashing embedder.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn EmbeddingProvider>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    if use_fake || settings.provider == EmbeddingKind::Hash {
        info!(dim = settings.dim, "using hash embedder");
        return Ok(Box::new(HashEmbedder::new(settings.dim)));
    }
    Ok(Box::new(BgeM3Embedder::load(settings)?))
}

fn resolve_model_dir(configured: Option<&str>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = configured {
        let p = expand_path(dir);
        if p.exists() {
            return Ok(p);
        }
        warn!(dir = %p.display(), "configured model dir not found");
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() {
                debug!(var, dir = %p.display(), "model dir from env");
                return Ok(p);
            }
        }
    }
    let local = Path::new("models/bge-m3");
    if local.exists() {
        return Ok(local.to_path_buf());
    }
    Err(anyhow!("could not locate BGE-M3 model directory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_embedder_ignores_case_and_is_stable() {
        let e = HashEmbedder::new(64);
        let a = e.embed("Rust Lifetimes").unwrap();
        let b = e.embed("rust lifetimes").unwrap();
        assert_eq!(a, b);
        assert_eq!(e.id(), "hash:d64");
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let v = HashEmbedder::new(8).embed("").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
