use std::collections::HashMap;

use coderag_core::config::RetrievalConfig;
use coderag_core::types::{sort_by_score, RetrievalResult};

/// Weighted reciprocal rank fusion of a dense and a lexical ranking.
///
/// An item at 1-based position `r` of a stage contributes
/// `weight / (rrf_k + r)`; contributions add up per chunk id. Items keep the
/// per-stage score and rank of every stage they appeared in. Ties stay in
/// first-seen order, dense before lexical.
pub fn reciprocal_rank_fusion(
    dense: Vec<RetrievalResult>,
    lexical: Vec<RetrievalResult>,
    config: &RetrievalConfig,
) -> Vec<RetrievalResult> {
    let k = config.rrf_k as f32;
    let mut merged: Vec<RetrievalResult> = Vec::with_capacity(dense.len() + lexical.len());
    let mut position: HashMap<String, usize> = HashMap::new();

    for (i, hit) in dense.into_iter().enumerate() {
        let contribution = config.dense_weight / (k + (i + 1) as f32);
        match position.get(&hit.chunk_id) {
            Some(&at) => merged[at].score += contribution,
            None => {
                let mut item = RetrievalResult::new(hit.chunk_id.clone(), hit.content, hit.metadata, contribution);
                item.dense_score = hit.dense_score.or(Some(hit.score));
                item.dense_rank = Some(i + 1);
                position.insert(hit.chunk_id, merged.len());
                merged.push(item);
            }
        }
    }

    for (i, hit) in lexical.into_iter().enumerate() {
        let contribution = config.lexical_weight / (k + (i + 1) as f32);
        let at = match position.get(&hit.chunk_id) {
            Some(&at) => {
                merged[at].score += contribution;
                at
            }
            None => {
                position.insert(hit.chunk_id.clone(), merged.len());
                merged.push(RetrievalResult::new(hit.chunk_id.clone(), hit.content.clone(), hit.metadata.clone(), contribution));
                merged.len() - 1
            }
        };
        if merged[at].lexical_rank.is_none() {
            merged[at].lexical_score = hit.lexical_score.or(Some(hit.score));
            merged[at].lexical_rank = Some(i + 1);
        }
    }

    sort_by_score(&mut merged);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderag_core::types::{Chunk, ChunkKind};

    fn hit(name: &str, score: f32) -> RetrievalResult {
        let chunk = Chunk::new(format!("{name}.py"), ChunkKind::Function, Some(name), format!("def {name}(): pass"), 1, 1);
        RetrievalResult::from_chunk(&chunk, score)
    }

    fn ids(results: &[RetrievalResult]) -> Vec<&str> {
        results.iter().map(|r| r.metadata.name.as_deref().unwrap_or("")).collect()
    }

    #[test]
    fn item_in_both_lists_accumulates() {
        let config = RetrievalConfig::default();
        let fused = reciprocal_rank_fusion(vec![hit("a", 0.9), hit("b", 0.8)], vec![hit("a", 7.0), hit("c", 3.0)], &config);
        assert_eq!(ids(&fused), vec!["a", "b", "c"]);
        assert!((fused[0].score - (0.7 / 61.0 + 0.3 / 61.0)).abs() < 1e-6);
        assert!((fused[1].score - 0.7 / 62.0).abs() < 1e-6);
        assert!((fused[2].score - 0.3 / 62.0).abs() < 1e-6);
        assert_eq!((fused[0].dense_rank, fused[0].lexical_rank), (Some(1), Some(1)));
        assert_eq!(fused[0].lexical_score, Some(7.0));
        assert_eq!(fused[2].dense_rank, None);
    }

    #[test]
    fn top_of_both_beats_top_of_one() {
        for (dense_weight, lexical_weight) in [(0.7, 0.3), (0.3, 0.7), (0.5, 0.5)] {
            let config = RetrievalConfig { dense_weight, lexical_weight, ..RetrievalConfig::default() };
            let fused = reciprocal_rank_fusion(vec![hit("both", 1.0), hit("d", 0.5)], vec![hit("both", 9.0), hit("l", 2.0)], &config);
            assert_eq!(ids(&fused)[0], "both");
            assert!(fused[0].score > fused[1].score);
        }
    }

    #[test]
    fn equal_scores_keep_dense_first() {
        let config = RetrievalConfig { dense_weight: 0.5, lexical_weight: 0.5, ..RetrievalConfig::default() };
        let fused = reciprocal_rank_fusion(vec![hit("d", 0.1)], vec![hit("l", 0.1)], &config);
        assert_eq!(ids(&fused), vec!["d", "l"]);
    }

    #[test]
    fn empty_inputs_give_empty_output() {
        assert!(reciprocal_rank_fusion(Vec::new(), Vec::new(), &RetrievalConfig::default()).is_empty());
    }
}
