use anyhow::{ensure, Result};
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, StringArray};
use std::sync::Arc;

use coderag_core::types::Chunk;

use crate::schema::build_chunk_schema;

fn to_i32(v: usize) -> i32 { i32::try_from(v).unwrap_or(i32::MAX) }

/// Rows for `chunks` in input order; `vectors[i]` belongs to `chunks[i]`.
pub fn chunks_to_record_batch(chunks: &[Chunk], vectors: &[Vec<f32>], dim: usize) -> Result<RecordBatch> {
	ensure!(chunks.len() == vectors.len(), "chunks and embeddings length must match ({} vs {})", chunks.len(), vectors.len());
	let dim_i32 = i32::try_from(dim)?;
	let schema = build_chunk_schema(dim_i32);

	let mut ids = Vec::with_capacity(chunks.len());
	let mut ordinals = Vec::with_capacity(chunks.len());
	let mut file_paths = Vec::with_capacity(chunks.len());
	let mut chunk_types = Vec::with_capacity(chunks.len());
	let mut names = Vec::with_capacity(chunks.len());
	let mut parents = Vec::with_capacity(chunks.len());
	let mut languages = Vec::with_capacity(chunks.len());
	let mut start_lines = Vec::with_capacity(chunks.len());
	let mut end_lines = Vec::with_capacity(chunks.len());
	let mut imports = Vec::with_capacity(chunks.len());
	let mut repo_names = Vec::with_capacity(chunks.len());
	let mut docstrings = Vec::with_capacity(chunks.len());
	let mut contents = Vec::with_capacity(chunks.len());
	let mut vector_rows: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());

	for (ordinal, (chunk, vector)) in chunks.iter().zip(vectors).enumerate() {
		ensure!(vector.len() == dim, "chunk {} has a {}-dim vector, expected {}", chunk.id, vector.len(), dim);
		let meta = chunk.meta();
		ids.push(chunk.id.clone());
		ordinals.push(to_i32(ordinal));
		file_paths.push(meta.file_path);
		chunk_types.push(meta.chunk_type.as_str().to_string());
		names.push(meta.name);
		parents.push(meta.parent);
		languages.push(meta.language);
		start_lines.push(i32::try_from(meta.start_line).unwrap_or(i32::MAX));
		end_lines.push(i32::try_from(meta.end_line).unwrap_or(i32::MAX));
		imports.push(meta.imports);
		repo_names.push(meta.repo_name);
		docstrings.push(meta.docstring);
		contents.push(chunk.content.clone());
		vector_rows.push(Some(vector.iter().map(|&x| Some(x)).collect()));
	}

	let record_batch = RecordBatch::try_new(schema, vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(Int32Array::from(ordinals)),
		Arc::new(StringArray::from(file_paths)),
		Arc::new(StringArray::from(chunk_types)),
		Arc::new(StringArray::from(names)),
		Arc::new(StringArray::from(parents)),
		Arc::new(StringArray::from(languages)),
		Arc::new(Int32Array::from(start_lines)),
		Arc::new(Int32Array::from(end_lines)),
		Arc::new(StringArray::from(imports)),
		Arc::new(StringArray::from(repo_names)),
		Arc::new(StringArray::from(docstrings)),
		Arc::new(StringArray::from(contents)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vector_rows.into_iter(), dim_i32)),
	])?;
	Ok(record_batch)
}
