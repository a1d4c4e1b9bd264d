use std::collections::BTreeSet;
use std::sync::Arc;

use coderag_core::config::{RerankStrategy, RerankerConfig};
use coderag_core::traits::PairScorer;
use coderag_core::types::{sort_by_score, ChunkKind, RetrievalResult};
use coderag_core::{Error, Result};

/// Final re-ordering of a short candidate list.
///
/// Implementations move the incoming score to `original_score`, write their
/// own score, sort descending (stable) and truncate to `top_k` when given.
pub trait Reranker: Send + Sync {
    fn rerank(&self, query: &str, results: Vec<RetrievalResult>, top_k: Option<usize>) -> Result<Vec<RetrievalResult>>;
}

fn finish(mut results: Vec<RetrievalResult>, top_k: Option<usize>) -> Vec<RetrievalResult> {
    sort_by_score(&mut results);
    if let Some(k) = top_k {
        results.truncate(k);
    }
    results
}

/// Keyword-overlap boosts on top of the fused score. Needs no model.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicReranker;

impl HeuristicReranker {
    pub const CONTENT_TERM_BOOST: f32 = 0.1;
    pub const NAME_IN_QUERY_BOOST: f32 = 0.3;
    pub const TERM_IN_NAME_BOOST: f32 = 0.15;
    pub const FUNCTION_BOOST: f32 = 0.1;
    pub const CLASS_BOOST: f32 = 0.05;

    /// Boost for one candidate given the lowercased query and its terms.
    pub fn boost(query_lower: &str, terms: &BTreeSet<&str>, result: &RetrievalResult) -> f32 {
        let content = result.content.to_lowercase();
        let mut boost = 0.0;
        for term in terms.iter().filter(|t| t.len() > 2) {
            if content.contains(term) {
                boost += Self::CONTENT_TERM_BOOST;
            }
        }
        if let Some(name) = result.metadata.name.as_deref().filter(|n| !n.is_empty()) {
            let name = name.to_lowercase();
            if query_lower.contains(&name) {
                boost += Self::NAME_IN_QUERY_BOOST;
            }
            for term in terms {
                if name.contains(term) {
                    boost += Self::TERM_IN_NAME_BOOST;
                }
            }
        }
        match result.metadata.chunk_type {
            ChunkKind::Function => boost += Self::FUNCTION_BOOST,
            ChunkKind::Class => boost += Self::CLASS_BOOST,
            _ => {}
        }
        boost
    }
}

impl Reranker for HeuristicReranker {
    fn rerank(&self, query: &str, mut results: Vec<RetrievalResult>, top_k: Option<usize>) -> Result<Vec<RetrievalResult>> {
        if results.is_empty() || top_k == Some(0) {
            return Ok(Vec::new());
        }
        let query_lower = query.to_lowercase();
        let terms: BTreeSet<&str> = query_lower.split_whitespace().collect();
        for result in &mut results {
            let base = if result.score.is_finite() { result.score } else { 0.0 };
            let boost = Self::boost(&query_lower, &terms, result);
            result.original_score = Some(base);
            result.score = base + boost;
        }
        Ok(finish(results, top_k))
    }
}

/// Scores `(query, passage)` pairs with a cross-encoder in one batch.
pub struct CrossEncoderReranker {
    scorer: Arc<dyn PairScorer>,
    max_chars: usize,
}

impl CrossEncoderReranker {
    pub fn new(scorer: Arc<dyn PairScorer>, max_chars: usize) -> Self {
        Self { scorer, max_chars }
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

impl Reranker for CrossEncoderReranker {
    fn rerank(&self, query: &str, mut results: Vec<RetrievalResult>, top_k: Option<usize>) -> Result<Vec<RetrievalResult>> {
        if results.is_empty() || top_k == Some(0) {
            return Ok(Vec::new());
        }
        let pairs: Vec<(&str, &str)> = results.iter().map(|r| (query, truncate_chars(&r.content, self.max_chars))).collect();
        let scores = self.scorer.score_pairs(&pairs).map_err(Error::Model)?;
        if scores.len() != results.len() {
            return Err(Error::Model(anyhow::anyhow!("cross-encoder returned {} scores for {} pairs", scores.len(), results.len())));
        }
        for (result, score) in results.iter_mut().zip(scores) {
            result.original_score = Some(result.score);
            result.score = score;
        }
        tracing::debug!(candidates = results.len(), "cross-encoder rerank");
        Ok(finish(results, top_k))
    }
}

/// The reranker `config.strategy` names. The cross-encoder model itself
/// loads on first use.
///
/// # Errors
/// [`Error::Model`] when the cross-encoder model directory cannot be found.
pub fn reranker_for(config: &RerankerConfig) -> Result<Box<dyn Reranker>> {
    match config.strategy {
        RerankStrategy::Heuristic => Ok(Box::new(HeuristicReranker)),
        RerankStrategy::CrossEncoder => {
            let scorer = coderag_embed::default_cross_encoder(config).map_err(Error::Model)?;
            Ok(Box::new(CrossEncoderReranker::new(scorer, config.max_chars)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
