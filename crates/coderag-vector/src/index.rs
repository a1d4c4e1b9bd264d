use futures::TryStreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use coderag_core::config::VectorStoreConfig;
use coderag_core::traits::{EmbeddingProvider, VectorIndexer};
use coderag_core::types::{validate_chunks, Chunk, CollectionStats, MetaFilter, RetrievalResult};
use coderag_core::{Error, Result};

use crate::cache::{self, cache_table_name, hash_content};
use crate::filter::{compile_filter, CompiledFilter};
use crate::search::batch_to_results;
use crate::table::{open_db, open_if_exists, replace_table, row_count};
use crate::writer::chunks_to_record_batch;

fn dense_err(e: anyhow::Error) -> Error { Error::Dense(format!("{e:#}")) }

/// Persistent cosine-similarity index over chunk embeddings.
///
/// Owns a tokio runtime and exposes the blocking [`VectorIndexer`] surface;
/// one LanceDB table per collection under the persist directory.
pub struct DenseIndex {
	rt: tokio::runtime::Runtime,
	db: Connection,
	collection: String,
	provider: Option<Arc<dyn EmbeddingProvider>>,
	batch_size: usize,
	count: usize,
}

impl DenseIndex {
	/// Open (or lazily create) the collection described by `config`. Rows
	/// persisted by an earlier process are searchable immediately.
	pub fn open(config: &VectorStoreConfig, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
		Self::connect(config, Some(provider))
	}

	/// Open the collection for `stats` and `delete_collection` only; no model
	/// is loaded. `build` and `search` fail with [`Error::Embedding`].
	pub fn open_admin(config: &VectorStoreConfig) -> Result<Self> {
		Self::connect(config, None)
	}

	fn connect(config: &VectorStoreConfig, provider: Option<Arc<dyn EmbeddingProvider>>) -> Result<Self> {
		let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
		std::fs::create_dir_all(&config.persist_directory)?;
		let collection = config.collection_name.clone();
		let (db, count) = rt
			.block_on(async {
				let db = open_db(&config.persist_directory).await?;
				let count = row_count(&db, &collection).await?;
				anyhow::Ok((db, count))
			})
			.map_err(dense_err)?;
		let embedder = provider.as_ref().map_or("none", |p| p.embedder_id());
		tracing::info!(collection = %collection, dir = %config.persist_directory, rows = count, embedder, "dense index opened");
		Ok(Self { rt, db, collection, provider, batch_size: config.embed_batch_size.max(1), count })
	}

	fn provider(&self) -> Result<&dyn EmbeddingProvider> {
		self.provider
			.as_deref()
			.ok_or_else(|| Error::Embedding(anyhow::anyhow!("collection '{}' was opened without an embedding provider", self.collection)))
	}

	pub fn collection(&self) -> &str { &self.collection }

	pub fn len(&self) -> usize { self.count }

	pub fn is_empty(&self) -> bool { self.count == 0 }

	/// Vectors cached for the current embedder in this collection.
	pub fn cached_vectors(&self) -> Result<usize> {
		let provider = self.provider()?;
		let table = cache_table_name(&self.collection, provider.dim());
		self.rt.block_on(cache::entry_count(&self.db, &table, provider.embedder_id())).map_err(dense_err)
	}

	/// Embed `texts` in input order, reusing cached vectors for texts seen
	/// before under the same embedder. Cache trouble is logged and ignored.
	fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		let provider = self.provider()?;
		let dim = provider.dim();
		let embedder_id = provider.embedder_id().to_string();
		let cache_table = cache_table_name(&self.collection, dim);
		let hashes: Vec<String> = texts.iter().map(|t| hash_content(t)).collect();
		let wanted: HashSet<String> = hashes.iter().cloned().collect();

		let mut known = self
			.rt
			.block_on(cache::get_many(&self.db, &cache_table, &embedder_id, dim, &wanted))
			.unwrap_or_else(|e| {
				tracing::warn!(error = %e, table = %cache_table, "embedding cache read failed, embedding everything");
				HashMap::new()
			});

		let mut seen = HashSet::new();
		let misses: Vec<usize> = (0..texts.len()).filter(|&i| !known.contains_key(&hashes[i]) && seen.insert(hashes[i].clone())).collect();
		tracing::info!(total = texts.len(), cached = texts.len() - misses.len(), to_embed = misses.len(), "embedding chunks");

		if !misses.is_empty() {
			let pb = ProgressBar::new(misses.len() as u64);
			pb.set_style(
				ProgressStyle::default_bar()
					.template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
					.unwrap_or_else(|_| ProgressStyle::default_bar())
					.progress_chars("#>-"),
			);
			let mut fresh = Vec::with_capacity(misses.len());
			for batch in misses.chunks(self.batch_size) {
				let inputs: Vec<String> = batch.iter().map(|&i| texts[i].clone()).collect();
				let vectors = provider.embed_documents(&inputs).map_err(Error::Embedding)?;
				if vectors.len() != inputs.len() {
					return Err(Error::Embedding(anyhow::anyhow!("provider returned {} vectors for {} texts", vectors.len(), inputs.len())));
				}
				for (&i, v) in batch.iter().zip(vectors) {
					if v.len() != dim {
						return Err(Error::Embedding(anyhow::anyhow!("provider returned a {}-dim vector, expected {dim}", v.len())));
					}
					fresh.push((hashes[i].clone(), v));
				}
				pb.inc(batch.len() as u64);
			}
			pb.finish_and_clear();

			if let Err(e) = self.rt.block_on(cache::put_many(&self.db, &cache_table, &embedder_id, dim, &fresh)) {
				tracing::warn!(error = %e, table = %cache_table, "embedding cache write failed");
			}
			known.extend(fresh);
		}
		if let Err(e) = self.rt.block_on(cache::prune(&self.db, &cache_table, &embedder_id, &wanted)) {
			tracing::warn!(error = %e, table = %cache_table, "embedding cache prune failed");
		}

		hashes
			.iter()
			.map(|h| known.get(h).cloned().ok_or_else(|| Error::Embedding(anyhow::anyhow!("no vector for content hash {h}"))))
			.collect()
	}
}

impl VectorIndexer for DenseIndex {
	fn build(&mut self, chunks: &[Chunk]) -> Result<()> {
		validate_chunks(chunks)?;
		if chunks.is_empty() {
			return self.delete_collection();
		}
		let dim = self.provider()?.dim();
		let texts: Vec<String> = chunks.iter().map(Chunk::embedding_text).collect();
		let vectors = self.embed_all(&texts)?;
		let batch = chunks_to_record_batch(chunks, &vectors, dim).map_err(dense_err)?;
		self.rt.block_on(replace_table(&self.db, &self.collection, batch)).map_err(dense_err)?;
		self.count = chunks.len();
		tracing::info!(collection = %self.collection, rows = self.count, "dense index built");
		Ok(())
	}

	fn search(&self, query: &str, top_k: usize, filter: Option<&MetaFilter>) -> Result<Vec<RetrievalResult>> {
		if top_k == 0 || self.count == 0 || query.trim().is_empty() {
			return Ok(Vec::new());
		}
		let predicate = match compile_filter(filter) {
			CompiledFilter::All => None,
			CompiledFilter::Sql(sql) => Some(sql),
			CompiledFilter::Never(reason) => {
				tracing::warn!(%reason, "metadata filter can never match");
				return Ok(Vec::new());
			}
		};
		let qv = self.provider()?.embed_query(query).map_err(Error::Embedding)?;

		let mut rows = self
			.rt
			.block_on(async {
				let Some(table) = open_if_exists(&self.db, &self.collection).await? else { return anyhow::Ok(Vec::new()) };
				let mut q = table.vector_search(qv)?.distance_type(DistanceType::Cosine).limit(top_k);
				if let Some(sql) = predicate {
					q = q.only_if(sql);
				}
				let mut stream = q.execute().await?;
				let mut rows = Vec::new();
				while let Some(batch) = stream.try_next().await? {
					batch_to_results(&batch, &mut rows)?;
				}
				Ok(rows)
			})
			.map_err(dense_err)?;

		rows.sort_by(|a, b| b.1.score.total_cmp(&a.1.score).then(a.0.cmp(&b.0)));
		rows.truncate(top_k);
		Ok(rows
			.into_iter()
			.enumerate()
			.map(|(rank, (_, mut r))| {
				r.dense_rank = Some(rank + 1);
				r
			})
			.collect())
	}

	fn stats(&self) -> Result<CollectionStats> {
		Ok(CollectionStats { name: self.collection.clone(), count: self.count })
	}

	/// Remove every row; the collection stays usable for the next build.
	fn delete_collection(&mut self) -> Result<()> {
		self.rt
			.block_on(async {
				if let Some(table) = open_if_exists(&self.db, &self.collection).await? {
					table.delete("true").await?;
				}
				anyhow::Ok(())
			})
			.map_err(dense_err)?;
		self.count = 0;
		tracing::info!(collection = %self.collection, "dense collection cleared");
		Ok(())
	}
}
