//! Sentence embeddings for chunk and query text.
//!
//! `MiniLmEmbedder` runs a BERT sentence-transformer (all-MiniLM-L6-v2 by
//! default) through candle with masked mean pooling and L2 normalisation.
//! `FakeEmbedder` is a deterministic token-hashing stand-in selected with
//! `APP_USE_FAKE_EMBEDDINGS=1` so tests never download a model.

use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{info, warn};

use feeder_core::config::EmbeddingSettings;
use feeder_core::traits::Embedder;

pub mod device;
pub mod pool;
pub mod tokenize;

pub use pool::masked_mean_l2;

pub const MINILM_DIM: usize = 384;
const DEFAULT_MODEL_DIR: &str = "models/all-MiniLM-L6-v2";

pub struct MiniLmEmbedder { model: BertModel, tokenizer: Tokenizer, device: Device, dim: usize, max_len: usize, pad_id: u32 }

impl MiniLmEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let device = device::select_device();
        let model_dir = resolve_model_dir(settings)?;
        Self::from_dir(&model_dir, settings.max_len, device)
    }

    pub fn from_dir(model_dir: &Path, max_len: usize, device: Device) -> Result<Self> {
        info!("Loading embedding model from {}", model_dir.display());
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let dim = raw.get("hidden_size").and_then(serde_json::Value::as_u64)
            .ok_or_else(|| anyhow!("{} has no hidden_size", config_path.display()))?;
        let dim = usize::try_from(dim)?;
        let config: BertConfig = serde_json::from_value(raw)?;
        let vb = load_weights(model_dir, &device)?;
        let model = BertModel::load(vb, &config)?;
        let pad_id = tokenize::pad_token_id(&tokenizer);
        info!("Embedding model loaded (dim={}, max_len={})", dim, max_len);
        Ok(Self { model, tokenizer, device, dim, max_len, pad_id })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let (input_ids, attention_mask) = tokenize::tokenize_on_device(&self.tokenizer, text, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let emb = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1::<f32>()?;
        if emb.len() != self.dim { return Err(anyhow!("model produced {} dims, expected {}", emb.len(), self.dim)); }
        Ok(emb)
    }
}

impl Embedder for MiniLmEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { texts.iter().map(|t| self.embed_text(t)).collect() }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        // SAFETY: the weights file is not modified while the VarBuilder maps it.
        return Ok(unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, device)? });
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let weights: HashMap<String, Tensor> = candle_core::pickle::read_all(&pickle)?.into_iter().collect();
        return Ok(VarBuilder::from_tensors(weights, DType::F32, device));
    }
    Err(anyhow!("No model.safetensors or pytorch_model.bin in {}", model_dir.display()))
}

/// Deterministic, model-free embedder: each whitespace token is hashed into a bucket.
/// Identical texts map to identical vectors, so exact-text queries land at distance 0.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            // two seeds so one bucket collision cannot make distinct single-token texts identical
            for seed in 0..2u64 {
                let mut hasher = XxHash64::with_seed(seed); token.hash(&mut hasher); let h = hasher.finish();
                let idx = usize::try_from(h % self.dim as u64).unwrap_or(0);
                let val = f32::from(u16::try_from(h >> 48).unwrap_or(u16::MAX)) / f32::from(u16::MAX);
                v[idx] += val + (i % 3) as f32 * 0.01;
            }
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6); for x in &mut v { *x /= norm; } v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_text(t)).collect()) }
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if use_fake_embeddings() { info!("Using FakeEmbedder"); return Ok(Box::new(FakeEmbedder::new(MINILM_DIM))); }
    Ok(Box::new(MiniLmEmbedder::new(settings)?))
}

fn resolve_model_dir(settings: &EmbeddingSettings) -> Result<PathBuf> {
    if let Some(dir) = &settings.model_dir { let p = feeder_core::config::expand_path(dir); if p.exists() { info!("Using embedding.model_dir: {}", p.display()); return Ok(p); } warn!("embedding.model_dir {} does not exist", p.display()); }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") { let p = PathBuf::from(&dir); if p.exists() { info!("Using APP_MODEL_DIR: {}", p.display()); return Ok(p); } }
    if let Ok(dir) = std::env::var("MODEL_DIR") { let p = PathBuf::from(&dir); if p.exists() { info!("Using MODEL_DIR: {}", p.display()); return Ok(p); } }
    let local = Path::new(DEFAULT_MODEL_DIR); if local.exists() { info!("Using model dir: {}", local.display()); return Ok(local.to_path_buf()); }
    download_model(&settings.repo_id)
}

fn download_model(repo_id: &str) -> Result<PathBuf> {
    info!("Fetching {} from the Hugging Face hub", repo_id);
    let api = hf_hub::api::sync::Api::new().map_err(|e| anyhow!("Failed to create Hugging Face API client: {}", e))?;
    let repo = api.model(repo_id.to_string());
    let config_path = repo.get("config.json").map_err(|e| anyhow!("Failed to download config.json from {}: {}", repo_id, e))?;
    repo.get("tokenizer.json").map_err(|e| anyhow!("Failed to download tokenizer.json from {}: {}", repo_id, e))?;
    repo.get("model.safetensors").map_err(|e| anyhow!("Failed to download model.safetensors from {}: {}", repo_id, e))?;
    config_path.parent().map(Path::to_path_buf).ok_or_else(|| anyhow!("Could not locate downloaded model directory for {}", repo_id))
}
