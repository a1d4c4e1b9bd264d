use anyhow::{anyhow, Result};
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::{Linear, Module};
use candle_transformers::models::bert::BertModel;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use coderag_core::traits::PairScorer;

use crate::bert::{load_weights, read_config};
use crate::device::select_device;
use crate::lazy::{LazyModel, ModelStatus};
use crate::tokenize::{encode_batch, load_tokenizer};

struct LoadedCrossEncoder {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
}

impl LoadedCrossEncoder {
    fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let config = read_config(model_dir)?;
        let device = select_device();
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"), max_len)?;
        let vb = load_weights(model_dir, &device)?;
        let bert = BertModel::load(vb.clone(), &config.bert)?;
        let hidden = config.hidden_size;
        let pooler = candle_nn::linear(hidden, hidden, vb.pp("bert.pooler.dense"))?;
        let classifier = candle_nn::linear(hidden, config.num_labels, vb.pp("classifier"))?;
        Ok(Self { bert, pooler, classifier, tokenizer, device })
    }

    fn logits(&self, pairs: &[(&str, &str)]) -> Result<Tensor> {
        let batch = encode_batch(&self.tokenizer, pairs.to_vec(), &self.device)?;
        let hidden = self.bert.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let pooled = self.pooler.forward(&hidden.i((.., 0))?)?.tanh()?;
        Ok(self.classifier.forward(&pooled)?)
    }
}

/// Sequence-pair relevance model (e.g. `ms-marco-MiniLM-L-6-v2`) that scores
/// a query and a passage jointly. Weights load on first use.
pub struct CrossEncoder {
    model: LazyModel<LoadedCrossEncoder>,
}

impl CrossEncoder {
    pub fn new(model_dir: impl Into<PathBuf>, max_len: usize) -> Result<Self> {
        let model_dir = model_dir.into();
        if !model_dir.join("config.json").exists() {
            return Err(anyhow!("cross-encoder directory {} has no config.json", model_dir.display()));
        }
        let name = format!("cross-encoder:{}", model_dir.display());
        Ok(Self { model: LazyModel::new(name, move || LoadedCrossEncoder::load(&model_dir, max_len)) })
    }

    pub fn status(&self) -> ModelStatus {
        self.model.status()
    }

    pub fn ensure_ready(&self) -> Result<()> {
        self.model.ensure_ready()
    }
}

impl PairScorer for CrossEncoder {
    fn score_pairs(&self, pairs: &[(&str, &str)]) -> Result<Vec<f32>> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        let loaded = self.model.get()?;
        let logits = loaded.logits(pairs)?;
        // Single-label heads emit one relevance logit; multi-label heads
        // use the last ("relevant") column.
        let cols = logits.dim(1)?;
        let scores: Vec<f32> = logits.i((.., cols - 1))?.to_device(&Device::Cpu)?.to_vec1()?;
        Ok(scores)
    }
}
