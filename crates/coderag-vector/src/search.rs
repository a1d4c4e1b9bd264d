use anyhow::{anyhow, Result};
use arrow_array::{Array, Float32Array, Int32Array, RecordBatch, StringArray};

use coderag_core::types::{ChunkKind, ChunkMeta, RetrievalResult};

fn strings<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("missing or mistyped column '{name}'"))
}

fn ints<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<Int32Array>()).ok_or_else(|| anyhow!("missing or mistyped column '{name}'"))
}

fn optional(col: &StringArray, i: usize) -> Option<String> {
	if col.is_null(i) { None } else { Some(col.value(i).to_string()) }
}

fn line(v: i32) -> u32 { u32::try_from(v).unwrap_or(0) }

/// Decode one result batch into `(ordinal, result)` pairs scored `1 - distance`.
pub fn batch_to_results(batch: &RecordBatch, out: &mut Vec<(i32, RetrievalResult)>) -> Result<()> {
	let id = strings(batch, "id")?;
	let ordinal = ints(batch, "ordinal")?;
	let file_path = strings(batch, "file_path")?;
	let chunk_type = strings(batch, "chunk_type")?;
	let name = strings(batch, "name")?;
	let parent = strings(batch, "parent")?;
	let language = strings(batch, "language")?;
	let start_line = ints(batch, "start_line")?;
	let end_line = ints(batch, "end_line")?;
	let imports = strings(batch, "imports")?;
	let repo_name = strings(batch, "repo_name")?;
	let docstring = strings(batch, "docstring")?;
	let content = strings(batch, "content")?;
	let distance = batch
		.column_by_name("_distance")
		.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
		.ok_or_else(|| anyhow!("search result has no _distance column"))?;

	for i in 0..batch.num_rows() {
		let kind: ChunkKind = chunk_type.value(i).parse()?;
		let meta = ChunkMeta {
			file_path: file_path.value(i).to_string(),
			chunk_type: kind,
			language: language.value(i).to_string(),
			start_line: line(start_line.value(i)),
			end_line: line(end_line.value(i)),
			name: optional(name, i),
			parent: optional(parent, i),
			imports: imports.value(i).to_string(),
			repo_name: optional(repo_name, i),
			docstring: optional(docstring, i),
		};
		let score = 1.0 - distance.value(i);
		let mut result = RetrievalResult::new(id.value(i), content.value(i), meta, score);
		result.dense_score = Some(score);
		out.push((ordinal.value(i), result));
	}
	Ok(())
}
