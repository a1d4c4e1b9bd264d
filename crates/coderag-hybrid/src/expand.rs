use std::collections::{BTreeMap, BTreeSet, HashSet};

use coderag_core::config::ExpansionConfig;
use coderag_core::types::{Chunk, Provenance, RetrievalResult};
use coderag_graph::DependencyGraph;

/// Append chunks of files related to the leading results.
///
/// Seeds are the files of the first `seed_results` results. Their related
/// files (within `depth` hops) that no result already covers are visited in
/// path order; at most `max_new_files` of them contribute their first
/// `chunks_per_file` chunks in index order, each scored `score` and tagged
/// [`Provenance::Dependency`]. Returns how many chunks were appended.
pub fn expand_with_dependencies(
    results: &mut Vec<RetrievalResult>,
    graph: &DependencyGraph,
    chunks: &[Chunk],
    by_file: &BTreeMap<String, Vec<usize>>,
    config: &ExpansionConfig,
) -> usize {
    if results.is_empty() || graph.is_null() || config.max_new_files == 0 || config.chunks_per_file == 0 {
        return 0;
    }
    let seeds: BTreeSet<&str> = results
        .iter()
        .take(config.seed_results)
        .map(|r| r.metadata.file_path.as_str())
        .filter(|p| !p.is_empty())
        .collect();
    let related: BTreeSet<String> = seeds.iter().flat_map(|f| graph.related(f, config.depth)).collect();
    let present_files: HashSet<&str> = results.iter().map(|r| r.metadata.file_path.as_str()).collect();
    let new_files: Vec<&String> = related
        .iter()
        .filter(|f| !present_files.contains(f.as_str()) && by_file.contains_key(f.as_str()))
        .take(config.max_new_files)
        .collect();
    if new_files.is_empty() {
        return 0;
    }

    let mut present_ids: HashSet<String> = results.iter().map(|r| r.chunk_id.clone()).collect();
    let mut appended = Vec::new();
    for file in new_files {
        let indices = by_file.get(file.as_str()).map(Vec::as_slice).unwrap_or_default();
        for &i in indices.iter().take(config.chunks_per_file) {
            let chunk = &chunks[i];
            if present_ids.insert(chunk.id.clone()) {
                let mut result = RetrievalResult::from_chunk(chunk, config.score);
                result.provenance = Provenance::Dependency;
                appended.push(result);
            }
        }
    }
    tracing::debug!(seeds = seeds.len(), related = related.len(), appended = appended.len(), "dependency expansion");
    let count = appended.len();
    results.extend(appended);
    count
}
