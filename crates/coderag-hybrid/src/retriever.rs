use serde::Serialize;
use std::collections::BTreeMap;

use coderag_core::config::RetrievalConfig;
use coderag_core::traits::{TextIndexer, VectorIndexer};
use coderag_core::types::{validate_chunks, Chunk, CollectionStats, MetaFilter, RetrievalResult, SourceFile};
use coderag_core::Result;
use coderag_graph::DependencyGraph;

use crate::expand::expand_with_dependencies;
use crate::fusion::reciprocal_rank_fusion;
use crate::rerank::{HeuristicReranker, Reranker};

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub top_k: usize,
    /// `false` returns dense results only.
    pub use_hybrid: bool,
    pub use_dependencies: bool,
    pub filter: Option<MetaFilter>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { top_k: 10, use_hybrid: true, use_dependencies: true, filter: None }
    }
}

impl SearchOptions {
    pub fn top_k(top_k: usize) -> Self {
        Self { top_k, ..Self::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileDependencies {
    pub imports: Vec<String>,
    pub imported_by: Vec<String>,
}

/// Results grouped by file, with each file's import neighbors.
#[derive(Debug, Clone, Serialize)]
pub struct SearchContext {
    pub results: Vec<RetrievalResult>,
    pub files: BTreeMap<String, Vec<RetrievalResult>>,
    pub dependencies: BTreeMap<String, FileDependencies>,
    pub total_results: usize,
}

#[derive(Default)]
struct Corpus {
    chunks: Vec<Chunk>,
    by_file: BTreeMap<String, Vec<usize>>,
    graph: Option<DependencyGraph>,
}

impl Corpus {
    fn new(chunks: &[Chunk], graph: Option<DependencyGraph>) -> Self {
        let mut by_file: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, chunk) in chunks.iter().enumerate() {
            by_file.entry(chunk.file_path.clone()).or_default().push(i);
        }
        Self { chunks: chunks.to_vec(), by_file, graph }
    }
}

fn build_graph(files: &[SourceFile]) -> Option<DependencyGraph> {
    match DependencyGraph::build(files) {
        Ok(graph) if graph.is_null() => None,
        Ok(graph) => Some(graph),
        Err(e) => {
            tracing::warn!(error = %e, "dependency graph unavailable, expansion disabled");
            None
        }
    }
}

/// Lexical + dense retrieval fused by weighted RRF, optionally widened along
/// the import graph, plus the configured reranker.
pub struct HybridRetriever<TI: TextIndexer, VI: VectorIndexer> {
    config: RetrievalConfig,
    lexical: TI,
    dense: VI,
    corpus: Corpus,
    reranker: Box<dyn Reranker>,
}

impl<TI: TextIndexer, VI: VectorIndexer> HybridRetriever<TI, VI> {
    /// # Errors
    /// [`coderag_core::Error::InvalidConfig`] when `config` fails validation.
    pub fn new(config: RetrievalConfig, lexical: TI, dense: VI) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, lexical, dense, corpus: Corpus::default(), reranker: Box::new(HeuristicReranker) })
    }

    #[must_use]
    pub fn with_reranker(mut self, reranker: Box<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.corpus.chunks
    }

    /// The import graph of the last `index` call, if one was built.
    pub fn dependency_graph(&self) -> Option<&DependencyGraph> {
        self.corpus.graph.as_ref()
    }

    /// Top `opts.top_k` results for `query`, not yet reranked.
    ///
    /// # Errors
    /// Stage failures from either index, including query embedding errors.
    pub fn search(&self, query: &str, opts: &SearchOptions) -> Result<Vec<RetrievalResult>> {
        let top_k = opts.top_k;
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let filter = opts.filter.as_ref().filter(|f| !f.is_empty());
        if !opts.use_hybrid {
            let mut dense = self.dense.search(query, top_k, filter)?;
            dense.truncate(top_k);
            return Ok(dense);
        }

        let fetch_k = top_k.saturating_mul(self.config.fetch_multiplier);
        let dense = self.dense.search(query, fetch_k, filter)?;
        let lexical = self.lexical.search(query, fetch_k, filter)?;
        tracing::debug!(dense = dense.len(), lexical = lexical.len(), fetch_k, "stage results");

        let mut fused = reciprocal_rank_fusion(dense, lexical, &self.config);
        if fused.is_empty() {
            return Ok(fused);
        }
        if opts.use_dependencies {
            if let Some(graph) = &self.corpus.graph {
                expand_with_dependencies(&mut fused, graph, &self.corpus.chunks, &self.corpus.by_file, &self.config.expansion);
            }
        }
        fused.truncate(top_k);
        Ok(fused)
    }

    /// Rerank with the configured strategy.
    ///
    /// # Errors
    /// See [`Reranker::rerank`].
    pub fn rerank(&self, query: &str, results: Vec<RetrievalResult>, top_k: Option<usize>) -> Result<Vec<RetrievalResult>> {
        self.reranker.rerank(query, results, top_k)
    }

    /// Rerank with an explicitly chosen strategy.
    ///
    /// # Errors
    /// See [`Reranker::rerank`].
    pub fn rerank_with(&self, reranker: &dyn Reranker, query: &str, results: Vec<RetrievalResult>, top_k: Option<usize>) -> Result<Vec<RetrievalResult>> {
        reranker.rerank(query, results, top_k)
    }

    /// Search with defaults, grouped by file with each file's graph neighbors.
    ///
    /// # Errors
    /// See [`HybridRetriever::search`].
    pub fn search_with_context(&self, query: &str, top_k: usize) -> Result<SearchContext> {
        let results = self.search(query, &SearchOptions::top_k(top_k))?;
        let mut files: BTreeMap<String, Vec<RetrievalResult>> = BTreeMap::new();
        for r in &results {
            let path = if r.metadata.file_path.is_empty() { "unknown".to_string() } else { r.metadata.file_path.clone() };
            files.entry(path).or_default().push(r.clone());
        }
        let dependencies = match &self.corpus.graph {
            Some(graph) => files
                .keys()
                .map(|path| {
                    (path.clone(), FileDependencies { imports: graph.dependencies(path), imported_by: graph.dependents(path) })
                })
                .collect(),
            None => BTreeMap::new(),
        };
        Ok(SearchContext { total_results: results.len(), results, files, dependencies })
    }

    /// # Errors
    /// Dense backend failures.
    pub fn get_stats(&self) -> Result<CollectionStats> {
        self.dense.stats()
    }

    /// Drop every dense entry. Lexical state and the graph stay until the
    /// next `index`.
    ///
    /// # Errors
    /// Dense backend failures.
    pub fn delete_collection(&mut self) -> Result<()> {
        self.dense.delete_collection()
    }
}

impl<TI: TextIndexer + Default, VI: VectorIndexer> HybridRetriever<TI, VI> {
    /// Rebuild every index from `chunks` (and the import graph from `files`).
    ///
    /// The new lexical index and corpus replace the old ones only after the
    /// dense build succeeded; a failed call leaves the previous generation
    /// searchable.
    ///
    /// # Errors
    /// Invalid or duplicate chunks, and lexical or dense build failures.
    pub fn index(&mut self, chunks: &[Chunk], files: Option<&[SourceFile]>) -> Result<()> {
        validate_chunks(chunks)?;
        tracing::info!(chunks = chunks.len(), files = files.map_or(0, <[SourceFile]>::len), "indexing");

        let mut lexical = TI::default();
        lexical.build(chunks)?;
        let graph = files.and_then(build_graph);
        self.dense.build(chunks)?;

        self.lexical = lexical;
        self.corpus = Corpus::new(chunks, graph);
        tracing::info!(
            chunks = self.corpus.chunks.len(),
            files = self.corpus.by_file.len(),
            graph = self.corpus.graph.is_some(),
            "hybrid indexing complete"
        );
        Ok(())
    }
}
