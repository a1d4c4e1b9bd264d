//! Lance-backed embedding cache keyed by `(content_hash, embedder_id)`.
//!
//! Consulted before calling the provider and written through on misses, so
//! rebuilding an unchanged chunk set reuses the stored vectors. Each build
//! prunes the rows its embedder no longer needs.

use anyhow::Result;
use arrow_array::cast::AsArray;
use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Connection;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::schema::build_cache_schema;
use crate::table::{ensure_table, open_if_exists};

pub fn hash_content(s: &str) -> String {
	blake3::hash(s.as_bytes()).to_hex().to_string()
}

/// Cache tables are per dimension so one embedder switch cannot break the
/// fixed-size vector column.
pub fn cache_table_name(collection: &str, dim: usize) -> String {
	format!("{collection}_embed_cache_d{dim}")
}

fn quote(s: &str) -> String { format!("'{}'", s.replace('\'', "''")) }

fn for_embedder(embedder_id: &str) -> String { format!("embedder_id = {}", quote(embedder_id)) }

fn hash_list<'a>(hashes: impl IntoIterator<Item = &'a String>) -> String {
	hashes.into_iter().map(|h| quote(h)).collect::<Vec<_>>().join(", ")
}

pub async fn get_many(conn: &Connection, table: &str, embedder_id: &str, dim: usize, hashes: &HashSet<String>) -> Result<HashMap<String, Vec<f32>>> {
	let mut out = HashMap::new();
	if hashes.is_empty() { return Ok(out); }
	let Some(t) = open_if_exists(conn, table).await? else { return Ok(out) };
	let mut stream = t.query().only_if(for_embedder(embedder_id)).execute().await?;
	while let Some(batch) = stream.try_next().await? {
		let (Some(hash_col), Some(vec_col)) = (
			batch.column_by_name("content_hash").and_then(|c| c.as_any().downcast_ref::<StringArray>()),
			batch.column_by_name("vector").and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>()),
		) else {
			anyhow::bail!("cache table {table} has an unexpected schema");
		};
		for i in 0..batch.num_rows() {
			let h = hash_col.value(i);
			if !hashes.contains(h) { continue; }
			let vals: Vec<f32> = vec_col.value(i).as_primitive::<arrow_array::types::Float32Type>().values().iter().copied().collect();
			if vals.len() == dim { out.insert(h.to_string(), vals); }
		}
	}
	Ok(out)
}

pub async fn put_many(conn: &Connection, table: &str, embedder_id: &str, dim: usize, entries: &[(String, Vec<f32>)]) -> Result<()> {
	if entries.is_empty() { return Ok(()); }
	let dim_i32 = i32::try_from(dim)?;
	let schema = build_cache_schema(dim_i32);
	let t = ensure_table(conn, table, schema.clone()).await?;
	let hashes: Vec<String> = entries.iter().map(|(h, _)| h.clone()).collect();
	let eids: Vec<String> = vec![embedder_id.to_string(); entries.len()];
	let vectors = entries.iter().map(|(_, v)| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
	let batch = RecordBatch::try_new(schema.clone(), vec![
		Arc::new(StringArray::from(hashes)),
		Arc::new(StringArray::from(eids)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim_i32)),
	])?;
	// Rows for the same keys are replaced, never duplicated.
	t.delete(&format!("{} AND content_hash IN ({})", for_embedder(embedder_id), hash_list(entries.iter().map(|(h, _)| h)))).await?;
	let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
	t.add(reader).execute().await?;
	Ok(())
}

/// Delete this embedder's rows whose hash is not in `keep`. Other embedders'
/// rows are left alone.
pub async fn prune(conn: &Connection, table: &str, embedder_id: &str, keep: &HashSet<String>) -> Result<()> {
	let Some(t) = open_if_exists(conn, table).await? else { return Ok(()) };
	let predicate = if keep.is_empty() {
		for_embedder(embedder_id)
	} else {
		format!("{} AND content_hash NOT IN ({})", for_embedder(embedder_id), hash_list(keep))
	};
	t.delete(&predicate).await?;
	Ok(())
}

/// Rows currently held for `embedder_id`.
pub async fn entry_count(conn: &Connection, table: &str, embedder_id: &str) -> Result<usize> {
	let Some(t) = open_if_exists(conn, table).await? else { return Ok(0) };
	Ok(t.count_rows(Some(for_embedder(embedder_id))).await?)
}
