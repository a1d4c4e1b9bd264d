use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{TextAnalyzer, WhitespaceTokenizer};
use tantivy::Index;

use coderag_core::{Error, Result};

/// Analyzer for the pre-tokenized `tokens` field. Input is already split and
/// lowercased by [`crate::tokenize`], so whitespace is the only boundary.
pub const TOKENS_ANALYZER: &str = "code_tokens";

#[derive(Clone, Copy)]
pub struct LexicalFields {
	pub ordinal: Field,
	pub chunk_id: Field,
	pub tokens: Field,
}

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let _ordinal_field = schema_builder.add_u64_field("ordinal", STORED);
	let _chunk_id_field = schema_builder.add_text_field("chunk_id", STRING | STORED);
	let tokens_indexing = TextFieldIndexing::default().set_tokenizer(TOKENS_ANALYZER).set_index_option(IndexRecordOption::WithFreqs);
	let _tokens_field = schema_builder.add_text_field("tokens", TextOptions::default().set_indexing_options(tokens_indexing));
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	let tokenizer = TextAnalyzer::builder(WhitespaceTokenizer::default()).build();
	index.tokenizers().register(TOKENS_ANALYZER, tokenizer);
}

impl LexicalFields {
	pub fn from_schema(schema: &Schema) -> Result<Self> {
		let field = |name: &str| schema.get_field(name).map_err(|e| Error::Lexical(e.to_string()));
		Ok(Self { ordinal: field("ordinal")?, chunk_id: field("chunk_id")?, tokens: field("tokens")? })
	}
}
