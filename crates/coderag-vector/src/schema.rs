use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

fn vector_field(dim: i32) -> Field {
	Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true)
}

/// One row per chunk: identity, insertion ordinal, the flattened metadata
/// record, raw content and the embedding.
pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("ordinal", DataType::Int32, false),
		Field::new("file_path", DataType::Utf8, false),
		Field::new("chunk_type", DataType::Utf8, false),
		Field::new("name", DataType::Utf8, true),
		Field::new("parent", DataType::Utf8, true),
		Field::new("language", DataType::Utf8, false),
		Field::new("start_line", DataType::Int32, false),
		Field::new("end_line", DataType::Int32, false),
		Field::new("imports", DataType::Utf8, false),
		Field::new("repo_name", DataType::Utf8, true),
		Field::new("docstring", DataType::Utf8, true),
		Field::new("content", DataType::Utf8, false),
		vector_field(dim),
	]))
}

pub fn build_cache_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("content_hash", DataType::Utf8, false),
		Field::new("embedder_id", DataType::Utf8, false),
		vector_field(dim),
	]))
}
