use crate::error::Result;
use crate::types::{Chunk, CollectionStats, MetaFilter, RetrievalResult};

/// Turns text into fixed-dimension, unit-length vectors.
pub trait EmbeddingProvider: Send + Sync {
    /// Identifies the model so cached vectors are never mixed across models.
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    /// One vector per input, in input order.
    fn embed_documents(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_documents(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for the query"))
    }
}

/// Jointly scores (query, passage) pairs, one score per pair.
pub trait PairScorer: Send + Sync {
    fn score_pairs(&self, pairs: &[(&str, &str)]) -> anyhow::Result<Vec<f32>>;
}

pub trait TextIndexer: Send + Sync {
    /// Replace the whole index with `chunks`.
    fn build(&mut self, chunks: &[Chunk]) -> Result<()>;
    /// Ranks are assigned among chunks that pass `filter`.
    fn search(&self, query: &str, top_k: usize, filter: Option<&MetaFilter>) -> Result<Vec<RetrievalResult>>;
}

pub trait VectorIndexer: Send + Sync {
    /// Replace the whole collection with `chunks`.
    fn build(&mut self, chunks: &[Chunk]) -> Result<()>;
    fn search(&self, query: &str, top_k: usize, filter: Option<&MetaFilter>) -> Result<Vec<RetrievalResult>>;
    fn stats(&self) -> Result<CollectionStats>;
    fn delete_collection(&mut self) -> Result<()>;
}
