//! coderag-embed
//!
//! Embedding providers and the cross-encoder pair scorer. Real models run on
//! candle and load lazily; `FakeEmbedder` needs no weights.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use coderag_core::config::{EmbeddingConfig, RerankerConfig};
use coderag_core::traits::{EmbeddingProvider, PairScorer};

pub mod bert;
pub mod cross_encoder;
pub mod device;
pub mod fake;
pub mod lazy;
pub mod pool;
pub mod tokenize;

pub use bert::BertEmbedder;
pub use cross_encoder::CrossEncoder;
pub use fake::FakeEmbedder;
pub use lazy::{LazyModel, ModelStatus};
pub use pool::{cls_l2, l2_normalize, masked_mean_l2};

fn env_flag(name: &str) -> bool {
    std::env::var(name).ok().is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Pick the embedder described by `config`. `APP_USE_FAKE_EMBEDDINGS=1`
/// forces the hashing embedder regardless of the file settings.
pub fn default_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    if config.use_fake || env_flag("APP_USE_FAKE_EMBEDDINGS") {
        tracing::info!(dim = config.fake_dim, "using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(config.fake_dim)));
    }
    let model_dir = match &config.model_dir {
        Some(dir) => PathBuf::from(dir),
        None => resolve_model_dir("APP_MODEL_DIR", "bge-base-en-v1.5")?,
    };
    Ok(Arc::new(BertEmbedder::new(model_dir, config.max_len, config.pooling)?))
}

pub fn default_cross_encoder(config: &RerankerConfig) -> Result<Arc<dyn PairScorer>> {
    let model_dir = match &config.model_dir {
        Some(dir) => PathBuf::from(dir),
        None => resolve_model_dir("APP_RERANKER_MODEL_DIR", "ms-marco-MiniLM-L-6-v2")?,
    };
    Ok(Arc::new(CrossEncoder::new(model_dir, config.max_len)?))
}

fn resolve_model_dir(env_var: &str, default_name: &str) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(env_var) {
        let p = PathBuf::from(&dir);
        if p.exists() {
            tracing::info!(dir = %p.display(), "using {env_var}");
            return Ok(p);
        }
    }
    for candidate in [Path::new("../models").join(default_name), Path::new("models").join(default_name)] {
        if candidate.exists() {
            tracing::info!(dir = %candidate.display(), "using model dir");
            return Ok(candidate);
        }
    }
    Err(anyhow!("Could not locate model directory for {default_name}; set {env_var} or configure model_dir"))
}
