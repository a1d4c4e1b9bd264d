use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use coderag_core::config::VectorStoreConfig;
use coderag_core::traits::{EmbeddingProvider, VectorIndexer};
use coderag_core::types::{Chunk, ChunkKind, MetaFilter, MetaValue};
use coderag_core::Error;
use coderag_embed::FakeEmbedder;
use coderag_vector::DenseIndex;

/// Counts how many texts reach the underlying embedder.
struct Counting {
	inner: FakeEmbedder,
	embedded: AtomicUsize,
}

impl EmbeddingProvider for Counting {
	fn embedder_id(&self) -> &str { self.inner.embedder_id() }
	fn dim(&self) -> usize { self.inner.dim() }
	fn embed_documents(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
		self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
		self.inner.embed_documents(texts)
	}
}

struct Failing;

impl EmbeddingProvider for Failing {
	fn embedder_id(&self) -> &str { "failing" }
	fn dim(&self) -> usize { 8 }
	fn embed_documents(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { anyhow::bail!("model offline") }
}

fn config(tmp: &TempDir) -> VectorStoreConfig {
	VectorStoreConfig {
		collection_name: "codebase".into(),
		persist_directory: tmp.path().join("vectors").to_string_lossy().into_owned(),
		embed_batch_size: 2,
	}
}

fn chunks() -> Vec<Chunk> {
	vec![
		Chunk::new("auth.py", ChunkKind::Function, Some("login"), "def login(user, password):\n    return check(user, password)", 1, 2),
		Chunk::new("models.py", ChunkKind::Class, Some("User"), "class User:\n    name: str", 1, 2),
		Chunk::new("db.py", ChunkKind::Function, Some("connect"), "def connect(url):\n    return Engine(url)", 4, 5),
	]
}

fn counting() -> Arc<Counting> {
	Arc::new(Counting { inner: FakeEmbedder::new(32), embedded: AtomicUsize::new(0) })
}

#[test]
fn empty_collection_returns_nothing() {
	let tmp = TempDir::new().unwrap();
	let index = DenseIndex::open(&config(&tmp), counting()).unwrap();
	assert!(index.is_empty());
	assert!(index.search("login", 5, None).unwrap().is_empty());
	assert_eq!(index.stats().unwrap().count, 0);
}

#[test]
fn exact_embedding_text_ranks_first() {
	let tmp = TempDir::new().unwrap();
	let mut index = DenseIndex::open(&config(&tmp), counting()).unwrap();
	let chunks = chunks();
	index.build(&chunks).unwrap();

	let results = index.search(&chunks[1].embedding_text(), 3, None).unwrap();
	assert_eq!(results.len(), 3);
	assert_eq!(results[0].chunk_id, chunks[1].id);
	assert!((results[0].score - 1.0).abs() < 1e-4);
	assert_eq!(results[0].content, chunks[1].content, "raw content, not the embedding text");
	assert_eq!(results[0].metadata.name.as_deref(), Some("User"));
	assert_eq!(results[0].dense_rank, Some(1));
	assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn blank_query_and_zero_top_k_return_nothing() {
	let tmp = TempDir::new().unwrap();
	let mut index = DenseIndex::open(&config(&tmp), counting()).unwrap();
	index.build(&chunks()).unwrap();
	assert!(index.search("   ", 3, None).unwrap().is_empty());
	assert!(index.search("login", 0, None).unwrap().is_empty());
}

#[test]
fn metadata_filter_restricts_results() {
	let tmp = TempDir::new().unwrap();
	let mut index = DenseIndex::open(&config(&tmp), counting()).unwrap();
	index.build(&chunks()).unwrap();

	let mut filter = MetaFilter::new();
	filter.insert("file_path".into(), MetaValue::from("db.py"));
	let results = index.search("user login", 10, Some(&filter)).unwrap();
	assert_eq!(results.len(), 1);
	assert_eq!(results[0].metadata.file_path, "db.py");

	let mut unknown = MetaFilter::new();
	unknown.insert("colour".into(), MetaValue::from("red"));
	assert!(index.search("user login", 10, Some(&unknown)).unwrap().is_empty());
}

#[test]
fn rebuild_replaces_and_reuses_cached_vectors() {
	let tmp = TempDir::new().unwrap();
	let provider = counting();
	let mut index = DenseIndex::open(&config(&tmp), provider.clone()).unwrap();
	index.build(&chunks()).unwrap();
	assert_eq!(provider.embedded.load(Ordering::SeqCst), 3);

	index.build(&chunks()).unwrap();
	assert_eq!(provider.embedded.load(Ordering::SeqCst), 3, "second build served from the cache");
	assert_eq!(index.stats().unwrap().count, 3);

	index.build(&chunks()[..1]).unwrap();
	assert_eq!(index.stats().unwrap().count, 1);
	let results = index.search("anything at all", 10, None).unwrap();
	assert_eq!(results.len(), 1);
}

#[test]
fn rows_survive_reopen_and_delete_clears_them() {
	let tmp = TempDir::new().unwrap();
	{
		let mut index = DenseIndex::open(&config(&tmp), counting()).unwrap();
		index.build(&chunks()).unwrap();
	}
	let mut index = DenseIndex::open(&config(&tmp), counting()).unwrap();
	let stats = index.stats().unwrap();
	assert_eq!((stats.name.as_str(), stats.count), ("codebase", 3));

	index.delete_collection().unwrap();
	assert_eq!(index.stats().unwrap().count, 0);
	assert!(index.search("login", 5, None).unwrap().is_empty());
	index.delete_collection().unwrap();
}

#[test]
fn embedding_failure_aborts_build() {
	let tmp = TempDir::new().unwrap();
	let mut index = DenseIndex::open(&config(&tmp), Arc::new(Failing)).unwrap();
	assert!(matches!(index.build(&chunks()), Err(Error::Embedding(_))));
	assert_eq!(index.stats().unwrap().count, 0);
}

#[test]
fn cache_keeps_only_the_current_generation() {
	let tmp = TempDir::new().unwrap();
	let provider = counting();
	let mut index = DenseIndex::open(&config(&tmp), provider.clone()).unwrap();
	index.build(&chunks()).unwrap();
	index.build(&chunks()).unwrap();
	assert_eq!(index.cached_vectors().unwrap(), 3, "rebuilds never duplicate cache rows");

	index.build(&chunks()[..1]).unwrap();
	assert_eq!(index.cached_vectors().unwrap(), 1, "dropped chunks leave the cache");

	index.build(&chunks()).unwrap();
	assert_eq!(provider.embedded.load(Ordering::SeqCst), 5, "pruned chunks are embedded again");
	assert_eq!(index.cached_vectors().unwrap(), 3);
}

#[test]
fn admin_handle_reads_stats_and_clears_without_a_model() {
	let tmp = TempDir::new().unwrap();
	DenseIndex::open(&config(&tmp), counting()).unwrap().build(&chunks()).unwrap();

	let mut admin = DenseIndex::open_admin(&config(&tmp)).unwrap();
	assert_eq!(admin.stats().unwrap().count, 3);
	assert!(matches!(admin.search("login", 5, None), Err(Error::Embedding(_))));
	assert!(matches!(admin.build(&chunks()), Err(Error::Embedding(_))));
	assert_eq!(admin.stats().unwrap().count, 3, "a failed build keeps the rows");

	admin.delete_collection().unwrap();
	assert_eq!(DenseIndex::open_admin(&config(&tmp)).unwrap().stats().unwrap().count, 0);
}
