use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use coderag_core::config::EmbeddingConfig;
use coderag_core::traits::EmbeddingProvider;
use coderag_embed::{default_embedder, BertEmbedder, FakeEmbedder, LazyModel, ModelStatus};

#[test]
fn fake_embedder_shapes_and_determinism() {
    let config = EmbeddingConfig { use_fake: true, fake_dim: 64, ..EmbeddingConfig::default() };
    let embedder = default_embedder(&config).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_documents(&texts).expect("embed_documents");
    assert_eq!(embedder.dim(), 64);
    assert_eq!(embs[0].len(), 64);

    let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in embs[0].iter().zip(embs[1].iter()) {
        assert!((a - b).abs() <= 1e-6);
    }

    let query = embedder.embed_query("hello world").expect("embed_query");
    assert_eq!(query, embs[0]);
}

#[test]
fn fake_embedder_ids_differ_by_dim() {
    assert_ne!(FakeEmbedder::new(8).embedder_id(), FakeEmbedder::new(16).embedder_id());
}

#[test]
fn lazy_model_loads_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let model = LazyModel::new("counter", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(42u32)
    });
    assert_eq!(model.status(), ModelStatus::Unloaded);
    assert_eq!(*model.get().unwrap(), 42);
    assert_eq!(*model.get().unwrap(), 42);
    assert_eq!(model.status(), ModelStatus::Ready);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn lazy_model_failure_is_sticky() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let model: LazyModel<u32> = LazyModel::new("broken", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("weights missing"))
    });
    assert!(model.ensure_ready().is_err());
    assert!(model.ensure_ready().is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    match model.status() {
        ModelStatus::Failed(msg) => assert!(msg.contains("weights missing")),
        other => panic!("unexpected status {other:?}"),
    }
}

#[test]
fn bert_embedder_requires_config() {
    let tmp = tempfile::TempDir::new().unwrap();
    assert!(BertEmbedder::new(tmp.path(), 512, Default::default()).is_err());
}

#[test]
fn bert_embedder_defers_weight_loading() {
    let tmp = tempfile::TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("config.json"),
        r#"{"vocab_size": 10, "hidden_size": 8, "num_hidden_layers": 1, "num_attention_heads": 2,
            "intermediate_size": 16, "hidden_act": "gelu", "hidden_dropout_prob": 0.0,
            "max_position_embeddings": 16, "type_vocab_size": 2, "initializer_range": 0.02,
            "layer_norm_eps": 1e-12, "pad_token_id": 0, "model_type": "bert"}"#,
    )
    .unwrap();
    let embedder = BertEmbedder::new(tmp.path(), 512, Default::default()).expect("config only");
    assert_eq!(embedder.dim(), 8);
    assert_eq!(embedder.status(), ModelStatus::Unloaded);
    assert!(embedder.embed_documents(&["x".to_string()]).is_err(), "no tokenizer or weights");
    assert!(matches!(embedder.status(), ModelStatus::Failed(_)));
}
