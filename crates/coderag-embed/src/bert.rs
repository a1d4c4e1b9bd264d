use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use coderag_core::config::Pooling;
use coderag_core::traits::EmbeddingProvider;

use crate::device::select_device;
use crate::lazy::{LazyModel, ModelStatus};
use crate::pool::{cls_l2, masked_mean_l2};
use crate::tokenize::{encode_batch, load_tokenizer};

/// Parsed `config.json` plus the fields read straight from the JSON.
pub(crate) struct ModelConfig {
    pub bert: BertConfig,
    pub hidden_size: usize,
    pub num_labels: usize,
}

pub(crate) fn read_config(model_dir: &Path) -> Result<ModelConfig> {
    let config_path = model_dir.join("config.json");
    let raw = std::fs::read_to_string(&config_path)
        .with_context(|| format!("reading {}", config_path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&raw)?;
    let hidden_size = json
        .get("hidden_size")
        .and_then(serde_json::Value::as_u64)
        .and_then(|h| usize::try_from(h).ok())
        .ok_or_else(|| anyhow!("{} has no hidden_size", config_path.display()))?;
    let num_labels = json
        .get("id2label")
        .and_then(serde_json::Value::as_object)
        .map_or(1, serde_json::Map::len)
        .max(1);
    let bert: BertConfig = serde_json::from_value(json)
        .with_context(|| format!("parsing {}", config_path.display()))?;
    Ok(ModelConfig { bert, hidden_size, num_labels })
}

/// Weights from `model.safetensors`, falling back to `pytorch_model.bin`.
pub(crate) fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    let weights: HashMap<String, Tensor> = if safetensors.exists() {
        candle_core::safetensors::load(&safetensors, device)?
    } else {
        let pickle = model_dir.join("pytorch_model.bin");
        candle_core::pickle::read_all(&pickle)
            .with_context(|| format!("no model.safetensors and could not read {}", pickle.display()))?
            .into_iter()
            .collect()
    };
    Ok(VarBuilder::from_tensors(weights, DType::F32, device))
}

pub(crate) struct LoadedBert {
    pub model: BertModel,
    pub tokenizer: Tokenizer,
    pub device: Device,
}

impl LoadedBert {
    pub fn load(model_dir: &Path, config: &BertConfig, max_len: usize) -> Result<Self> {
        let device = select_device();
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"), max_len)?;
        let vb = load_weights(model_dir, &device)?;
        let model = BertModel::load(vb, config)?;
        Ok(Self { model, tokenizer, device })
    }
}

/// BERT-family sentence embedder (BGE, MiniLM, ...) run with candle.
///
/// Construction reads only `config.json`; tokenizer and weights load on the
/// first embedding call or on [`BertEmbedder::ensure_ready`].
pub struct BertEmbedder {
    id: String,
    dim: usize,
    pooling: Pooling,
    model: LazyModel<LoadedBert>,
}

impl BertEmbedder {
    pub fn new(model_dir: impl Into<PathBuf>, max_len: usize, pooling: Pooling) -> Result<Self> {
        let model_dir = model_dir.into();
        let ModelConfig { bert: config, hidden_size: dim, .. } = read_config(&model_dir)?;
        let id = format!("bert:{}", model_dir.display());
        let loader_dir = model_dir.clone();
        let model = LazyModel::new(id.clone(), move || LoadedBert::load(&loader_dir, &config, max_len));
        Ok(Self { id, dim, pooling, model })
    }

    pub fn status(&self) -> ModelStatus {
        self.model.status()
    }

    pub fn ensure_ready(&self) -> Result<()> {
        self.model.ensure_ready()
    }
}

impl EmbeddingProvider for BertEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let loaded = self.model.get()?;
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let batch = encode_batch(&loaded.tokenizer, inputs, &loaded.device)?;
        let hidden = loaded.model.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let pooled = match self.pooling {
            Pooling::Cls => cls_l2(&hidden)?,
            Pooling::Mean => masked_mean_l2(&hidden, &batch.attention_mask)?,
        };
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        if vectors.len() != texts.len() {
            return Err(anyhow!("embedder returned {} vectors for {} texts", vectors.len(), texts.len()));
        }
        Ok(vectors)
    }
}
