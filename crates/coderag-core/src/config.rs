//! Layered configuration and path helpers.
//!
//! Figment merges compiled defaults, `config.toml`, `config.<env>.toml` and
//! `APP_*` environment variables (`__` separates sections, so
//! `APP_RETRIEVAL__RRF_K=30` sets `retrieval.rrf_k`). Typed sections are
//! extracted with [`Config::get`] or all at once with [`Config::settings`].

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Fusion weights, over-fetch factor and dependency expansion knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub dense_weight: f32,
    pub lexical_weight: f32,
    /// RRF smoothing constant added to every 1-based rank.
    pub rrf_k: u32,
    /// Each stage fetches `top_k * fetch_multiplier` candidates before fusion.
    pub fetch_multiplier: usize,
    pub expansion: ExpansionConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            dense_weight: 0.7,
            lexical_weight: 0.3,
            rrf_k: 60,
            fetch_multiplier: 3,
            expansion: ExpansionConfig::default(),
        }
    }
}

impl RetrievalConfig {
    /// # Errors
    /// [`Error::InvalidConfig`] for negative or all-zero weights, a zero
    /// `rrf_k` or a zero fetch multiplier.
    pub fn validate(&self) -> Result<()> {
        let weights = [self.dense_weight, self.lexical_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::InvalidConfig(format!(
                "fusion weights must be finite and non-negative (dense={}, lexical={})",
                self.dense_weight, self.lexical_weight
            )));
        }
        if weights.iter().all(|w| *w == 0.0) {
            return Err(Error::InvalidConfig("dense_weight and lexical_weight are both zero".into()));
        }
        if self.rrf_k == 0 {
            return Err(Error::InvalidConfig("rrf_k must be positive".into()));
        }
        if self.fetch_multiplier == 0 {
            return Err(Error::InvalidConfig("fetch_multiplier must be at least 1".into()));
        }
        if !self.expansion.score.is_finite() {
            return Err(Error::InvalidConfig("expansion.score must be finite".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// How many leading fused results seed the related-file lookup.
    pub seed_results: usize,
    pub depth: usize,
    pub max_new_files: usize,
    pub chunks_per_file: usize,
    /// Fixed score given to appended chunks.
    pub score: f32,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self { seed_results: 5, depth: 1, max_new_files: 3, chunks_per_file: 2, score: 0.1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub collection_name: String,
    pub persist_directory: String,
    pub embed_batch_size: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            collection_name: "codebase".to_string(),
            persist_directory: "./data/vectors".to_string(),
            embed_batch_size: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pooling {
    #[default]
    Cls,
    Mean,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Directory holding `config.json`, `tokenizer.json` and weights.
    pub model_dir: Option<String>,
    pub max_len: usize,
    pub pooling: Pooling,
    /// Use the deterministic hashing embedder instead of a model.
    pub use_fake: bool,
    /// Output dimension of the hashing embedder.
    pub fake_dim: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { model_dir: None, max_len: 512, pooling: Pooling::Cls, use_fake: false, fake_dim: 384 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankStrategy {
    #[default]
    Heuristic,
    CrossEncoder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    pub strategy: RerankStrategy,
    pub model_dir: Option<String>,
    /// Passages are cut to this many characters before pair scoring.
    pub max_chars: usize,
    pub max_len: usize,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self { strategy: RerankStrategy::Heuristic, model_dir: None, max_chars: 512, max_len: 512 }
    }
}

/// Every typed section, as loaded at process start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalConfig,
    pub vector_store: VectorStoreConfig,
    pub embedding: EmbeddingConfig,
    pub reranker: RerankerConfig,
}

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Load from the current directory.
    ///
    /// # Errors
    /// See [`Config::load_from`].
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load `config.toml` and `config.<env>.toml` from `dir`, where `<env>`
    /// comes from `RUST_ENV` (default `dev`). Missing files are skipped.
    ///
    /// # Errors
    /// [`Error::InvalidConfig`] when the merged sections fail validation.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let env_name = match env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string()).as_str() {
            "dev" | "development" => "dev".to_string(),
            "prod" | "production" => "prod".to_string(),
            "test" | "testing" => "test".to_string(),
            other => other.to_string(),
        };

        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")))
            .merge(Toml::file(dir.join(format!("config.{env_name}.toml"))))
            .merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: dir.to_path_buf() };
        config.settings()?;
        tracing::debug!(env = %env_name, dir = %dir.display(), "configuration loaded");
        Ok(config)
    }

    /// Defaults overlaid with an inline TOML document. No files or env.
    pub fn from_toml_str(toml: &str) -> Self {
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml));
        Self { figment, base_dir: PathBuf::from(".") }
    }

    /// # Errors
    /// [`Error::InvalidConfig`] when the key is missing or has the wrong shape.
    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// All sections with paths expanded against the config directory.
    ///
    /// # Errors
    /// [`Error::InvalidConfig`] on extraction or validation failure.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.retrieval.validate()?;
        if settings.vector_store.embed_batch_size == 0 {
            return Err(Error::InvalidConfig("vector_store.embed_batch_size must be positive".into()));
        }
        if settings.vector_store.collection_name.trim().is_empty() {
            return Err(Error::InvalidConfig("vector_store.collection_name is empty".into()));
        }
        let resolve = |p: &str| resolve_with_base(&self.base_dir, p).to_string_lossy().into_owned();
        settings.vector_store.persist_directory = resolve(&settings.vector_store.persist_directory);
        settings.embedding.model_dir = settings.embedding.model_dir.as_deref().map(resolve);
        settings.reranker.model_dir = settings.reranker.model_dir.as_deref().map(resolve);
        Ok(settings)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
