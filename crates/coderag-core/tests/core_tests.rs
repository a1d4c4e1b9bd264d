use std::fs;
use tempfile::TempDir;

use coderag_core::config::{Config, RerankStrategy, RetrievalConfig, Settings};
use coderag_core::types::{Chunk, ChunkKind, MetaValue};
use coderag_core::Error;

#[test]
fn defaults_match_fusion_constants() {
    let settings = Config::from_toml_str("").settings().expect("settings");
    assert_eq!(settings.retrieval.rrf_k, 60);
    assert!((settings.retrieval.dense_weight - 0.7).abs() < f32::EPSILON);
    assert!((settings.retrieval.lexical_weight - 0.3).abs() < f32::EPSILON);
    assert_eq!(settings.retrieval.fetch_multiplier, 3);
    assert_eq!(settings.retrieval.expansion.max_new_files, 3);
    assert_eq!(settings.retrieval.expansion.chunks_per_file, 2);
    assert_eq!(settings.vector_store.collection_name, "codebase");
    assert_eq!(settings.reranker.strategy, RerankStrategy::Heuristic);
}

#[test]
fn toml_overrides_individual_keys() {
    let config = Config::from_toml_str(
        r#"
        [retrieval]
        rrf_k = 30
        [retrieval.expansion]
        max_new_files = 5
        [reranker]
        strategy = "cross_encoder"
        "#,
    );
    let retrieval: RetrievalConfig = config.get("retrieval").expect("retrieval section");
    assert_eq!(retrieval.rrf_k, 30);
    assert_eq!(retrieval.expansion.max_new_files, 5);
    assert_eq!(retrieval.expansion.chunks_per_file, 2, "untouched keys keep defaults");
    let settings = config.settings().expect("settings");
    assert_eq!(settings.reranker.strategy, RerankStrategy::CrossEncoder);
}

#[test]
fn rejects_all_zero_weights() {
    let config = Config::from_toml_str("[retrieval]\ndense_weight = 0.0\nlexical_weight = 0.0\n");
    assert!(matches!(config.settings(), Err(Error::InvalidConfig(_))));
}

#[test]
fn load_from_reads_file_and_resolves_paths() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        "[vector_store]\ncollection_name = \"demo\"\npersist_directory = \"vectors\"\n",
    )
    .unwrap();
    let config = Config::load_from(tmp.path()).expect("load");
    let settings: Settings = config.settings().unwrap();
    assert_eq!(settings.vector_store.collection_name, "demo");
    assert_eq!(
        std::path::PathBuf::from(&settings.vector_store.persist_directory),
        tmp.path().join("vectors")
    );
}

#[test]
fn env_vars_override_files_per_key() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[retrieval]\ndense_weight = 0.9\nlexical_weight = 0.1\n")?;
        jail.create_file("config.dev.toml", "[retrieval]\nrrf_k = 40\n")?;
        jail.set_env("RUST_ENV", "dev");
        jail.set_env("APP_RETRIEVAL__DENSE_WEIGHT", "0.5");
        jail.set_env("APP_VECTOR_STORE__COLLECTION_NAME", "from_env");

        let config = Config::load_from(jail.directory()).map_err(|e| e.to_string())?;
        let settings = config.settings().map_err(|e| e.to_string())?;
        assert!((settings.retrieval.dense_weight - 0.5).abs() < f32::EPSILON);
        assert!((settings.retrieval.lexical_weight - 0.1).abs() < f32::EPSILON, "file value survives");
        assert_eq!(settings.retrieval.rrf_k, 40, "environment file layer applies");
        assert_eq!(settings.vector_store.collection_name, "from_env");
        Ok(())
    });
}

#[test]
fn chunk_deserializes_from_json_line() {
    let line = r#"{"id":"a_py_async_function_fetch_3","file_path":"a.py","content":"async def fetch(): ...",
        "kind":"async_function","name":"fetch","language":"python","start_line":3,"end_line":4,
        "metadata":{"repo_name":"owner_repo","stars":12}}"#;
    let chunk: Chunk = serde_json::from_str(line).expect("parse chunk");
    assert_eq!(chunk.kind, ChunkKind::AsyncFunction);
    assert!(chunk.imports.is_empty());
    assert_eq!(chunk.metadata.get("stars"), Some(&MetaValue::Int(12)));
    assert_eq!(chunk.meta().repo_name.as_deref(), Some("owner_repo"));
}
