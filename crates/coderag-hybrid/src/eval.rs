//! Cheap retrieval and answer quality metrics.

use serde::Serialize;
use std::collections::BTreeSet;

use coderag_core::types::RetrievalResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RetrievalMetrics {
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
}

/// File-level precision and recall of `results` against `relevant_files`.
pub fn evaluate_retrieval(results: &[RetrievalResult], relevant_files: &[String]) -> RetrievalMetrics {
    let relevant: BTreeSet<&str> = relevant_files.iter().map(String::as_str).collect();
    if relevant.is_empty() {
        return RetrievalMetrics::default();
    }
    let retrieved: BTreeSet<&str> = results.iter().map(|r| r.metadata.file_path.as_str()).filter(|p| !p.is_empty()).collect();
    let hits = retrieved.intersection(&relevant).count() as f32;
    let precision = if retrieved.is_empty() { 0.0 } else { hits / retrieved.len() as f32 };
    let recall = hits / relevant.len() as f32;
    let f1 = if precision + recall > 0.0 { 2.0 * precision * recall / (precision + recall) } else { 0.0 };
    RetrievalMetrics { precision, recall, f1 }
}

/// Share of distinct query words present in the answer.
pub fn answer_relevance(query: &str, answer: &str) -> f32 {
    if answer.is_empty() {
        return 0.0;
    }
    let query = query.to_lowercase();
    let terms: BTreeSet<&str> = query.split_whitespace().collect();
    if terms.is_empty() {
        return 0.0;
    }
    let answer = answer.to_lowercase();
    terms.iter().filter(|t| answer.contains(*t)).count() as f32 / terms.len() as f32
}

/// Share of substantial answer sentences (over 20 characters) that reuse a
/// word from their first five in the retrieved context.
pub fn faithfulness(answer: &str, context: &[RetrievalResult]) -> f32 {
    if answer.is_empty() || context.is_empty() {
        return 0.0;
    }
    let context_text = context.iter().map(|r| r.content.as_str()).collect::<Vec<_>>().join(" ").to_lowercase();
    let sentences: Vec<String> = answer.split('.').map(|s| s.trim().to_lowercase()).filter(|s| s.chars().count() > 20).collect();
    if sentences.is_empty() {
        return 0.0;
    }
    let grounded = sentences
        .iter()
        .filter(|s| s.split_whitespace().take(5).any(|w| context_text.contains(w)))
        .count();
    grounded as f32 / sentences.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderag_core::types::{Chunk, ChunkKind};

    fn result(path: &str, content: &str) -> RetrievalResult {
        RetrievalResult::from_chunk(&Chunk::new(path, ChunkKind::Module, None, content, 1, 1), 1.0)
    }

    #[test]
    fn precision_recall_over_files() {
        let results = vec![result("a.py", "x"), result("a.py", "y"), result("b.py", "z")];
        let m = evaluate_retrieval(&results, &["a.py".to_string(), "c.py".to_string()]);
        assert!((m.precision - 0.5).abs() < 1e-6);
        assert!((m.recall - 0.5).abs() < 1e-6);
        assert!((m.f1 - 0.5).abs() < 1e-6);
        assert_eq!(evaluate_retrieval(&results, &[]), RetrievalMetrics::default());
    }

    #[test]
    fn relevance_counts_query_terms() {
        assert!((answer_relevance("login token", "The LOGIN flow") - 0.5).abs() < 1e-6);
        assert_eq!(answer_relevance("login", ""), 0.0);
    }

    #[test]
    fn faithfulness_ignores_short_sentences() {
        let context = vec![result("auth.py", "def login(user): return issue_token(user)")];
        let answer = "Ok. The login function issues a token. Weather today was sunny and warm.";
        assert!((faithfulness(answer, &context) - 0.5).abs() < 1e-6);
    }
}
