use std::sync::Arc;
use tempfile::TempDir;

use coderag_core::config::{RetrievalConfig, VectorStoreConfig};
use coderag_core::types::{Chunk, ChunkKind};
use coderag_embed::FakeEmbedder;
use coderag_hybrid::{CodeRetriever, DenseIndex, HybridRetriever, LexicalIndex, SearchOptions};

fn open(tmp: &TempDir) -> CodeRetriever {
    let store = VectorStoreConfig {
        collection_name: "e2e".into(),
        persist_directory: tmp.path().to_string_lossy().into_owned(),
        ..VectorStoreConfig::default()
    };
    let dense = DenseIndex::open(&store, Arc::new(FakeEmbedder::new(64))).unwrap();
    HybridRetriever::new(RetrievalConfig::default(), LexicalIndex::empty(), dense).unwrap()
}

fn login_and_user() -> Vec<Chunk> {
    vec![
        Chunk::new("auth.py", ChunkKind::Function, Some("login"), "def login(): return auth_token", 1, 1),
        Chunk::new("models.py", ChunkKind::Class, Some("User"), "class User: pass", 1, 1),
    ]
}

#[test]
fn login_function_ranks_above_user_class() {
    let tmp = TempDir::new().unwrap();
    let mut retriever = open(&tmp);
    retriever.index(&login_and_user(), None).unwrap();

    let fused = retriever.search("login function", &SearchOptions::top_k(5)).unwrap();
    let pos = |name: &str| fused.iter().position(|r| r.metadata.name.as_deref() == Some(name)).unwrap();
    assert!(pos("login") < pos("User"));
    assert_eq!(fused[pos("login")].lexical_rank, Some(1));

    let reranked = retriever.rerank("login function", fused, None).unwrap();
    assert_eq!(reranked[0].metadata.name.as_deref(), Some("login"));
    assert!(reranked[0].original_score.is_some());
}

#[test]
fn stats_rebuild_and_delete_on_disk() {
    let tmp = TempDir::new().unwrap();
    let mut retriever = open(&tmp);
    retriever.index(&login_and_user(), None).unwrap();
    let first = retriever.search("login", &SearchOptions::top_k(5)).unwrap();

    retriever.index(&login_and_user(), None).unwrap();
    let second = retriever.search("login", &SearchOptions::top_k(5)).unwrap();
    let ids = |v: &[coderag_core::types::RetrievalResult]| v.iter().map(|r| (r.chunk_id.clone(), r.score)).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));

    let stats = retriever.get_stats().unwrap();
    assert_eq!((stats.name.as_str(), stats.count), ("e2e", 2));
    retriever.delete_collection().unwrap();
    assert_eq!(retriever.get_stats().unwrap().count, 0);
    let dense_only = SearchOptions { use_hybrid: false, ..SearchOptions::top_k(5) };
    assert!(retriever.search("login", &dense_only).unwrap().is_empty());
}
