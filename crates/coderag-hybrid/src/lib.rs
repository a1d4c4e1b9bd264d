//! Hybrid retrieval: weighted RRF over lexical and dense rankings,
//! dependency-graph expansion and reranking.

pub mod eval;
pub mod expand;
pub mod fusion;
pub mod query_expander;
pub mod rerank;
pub mod retriever;

pub use coderag_text::LexicalIndex;
pub use coderag_vector::DenseIndex;
pub use query_expander::{CodeEntities, MultiQueryHit, MultiQueryRetriever, QueryExpander};
pub use rerank::{reranker_for, CrossEncoderReranker, HeuristicReranker, Reranker};
pub use retriever::{FileDependencies, HybridRetriever, SearchContext, SearchOptions};

/// The production pairing: Tantivy BM25 plus a LanceDB dense collection.
pub type CodeRetriever = HybridRetriever<LexicalIndex, DenseIndex>;
