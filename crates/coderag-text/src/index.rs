use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use coderag_core::traits::TextIndexer;
use coderag_core::types::{Chunk, ChunkId, ChunkMeta, MetaFilter, RetrievalResult};
use coderag_core::{Error, Result};

use crate::tantivy_utils::{build_schema, register_tokenizer, LexicalFields};
use crate::tokenize::tokenize;

const WRITER_HEAP_BYTES: usize = 50_000_000;

fn lexical_err(e: impl std::fmt::Display) -> Error { Error::Lexical(e.to_string()) }

struct Entry {
	chunk_id: ChunkId,
	content: String,
	meta: ChunkMeta,
}

struct Built {
	reader: IndexReader,
	fields: LexicalFields,
	entries: Vec<Entry>,
}

/// BM25 index over chunk content.
///
/// An index built from nothing (or only from chunks without tokens) stays
/// empty and every search returns `[]`.
#[derive(Default)]
pub struct LexicalIndex {
	built: Option<Built>,
}

impl LexicalIndex {
	pub fn empty() -> Self { Self::default() }

	/// Tokenize and index `chunks`; the position of a surviving chunk is its
	/// tie-break order at query time.
	pub fn from_chunks(chunks: &[Chunk]) -> Result<Self> {
		let mut docs = Vec::with_capacity(chunks.len());
		for chunk in chunks {
			let tokens = tokenize(&chunk.content);
			if tokens.is_empty() {
				tracing::debug!(chunk_id = %chunk.id, "no lexical tokens, skipping chunk");
				continue;
			}
			docs.push((chunk, tokens.join(" ")));
		}
		let dropped = chunks.len() - docs.len();
		if dropped > 0 {
			tracing::warn!(dropped, "chunks without lexical tokens left out of the lexical index");
		}
		if docs.is_empty() {
			return Ok(Self::empty());
		}

		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let fields = LexicalFields::from_schema(&schema)?;

		let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES).map_err(lexical_err)?;
		let mut entries = Vec::with_capacity(docs.len());
		for (ordinal, (chunk, text)) in docs.into_iter().enumerate() {
			writer
				.add_document(doc!(
					fields.ordinal => ordinal as u64,
					fields.chunk_id => chunk.id.clone(),
					fields.tokens => text,
				))
				.map_err(lexical_err)?;
			entries.push(Entry { chunk_id: chunk.id.clone(), content: chunk.content.clone(), meta: chunk.meta() });
		}
		writer.commit().map_err(lexical_err)?;

		let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(lexical_err)?;
		tracing::info!(indexed = entries.len(), "lexical index built");
		Ok(Self { built: Some(Built { reader, fields, entries }) })
	}

	/// Number of indexed chunks.
	pub fn len(&self) -> usize { self.built.as_ref().map_or(0, |b| b.entries.len()) }

	pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl TextIndexer for LexicalIndex {
	fn build(&mut self, chunks: &[Chunk]) -> Result<()> {
		*self = Self::from_chunks(chunks)?;
		Ok(())
	}

	fn search(&self, query: &str, top_k: usize, filter: Option<&MetaFilter>) -> Result<Vec<RetrievalResult>> {
		let Some(built) = &self.built else { return Ok(Vec::new()) };
		let tokens = tokenize(query);
		if tokens.is_empty() || top_k == 0 {
			return Ok(Vec::new());
		}

		let clauses: Vec<(Occur, Box<dyn Query>)> = tokens
			.iter()
			.map(|t| {
				let term = Term::from_field_text(built.fields.tokens, t);
				(Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)) as Box<dyn Query>)
			})
			.collect();
		let query = BooleanQuery::new(clauses);

		// Every match is collected so equal scores can be ordered by ordinal
		// before truncation.
		let searcher = built.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(built.entries.len())).map_err(lexical_err)?;
		let mut scored = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			if score <= 0.0 {
				continue;
			}
			let doc: TantivyDocument = searcher.doc(addr).map_err(lexical_err)?;
			let ordinal = doc
				.get_first(built.fields.ordinal)
				.and_then(|v| v.as_u64())
				.and_then(|o| usize::try_from(o).ok())
				.filter(|o| *o < built.entries.len())
				.ok_or_else(|| Error::Lexical(format!("document {addr:?} has no valid ordinal")))?;
			if filter.is_some_and(|f| !built.entries[ordinal].meta.matches(f)) {
				continue;
			}
			scored.push((score, ordinal));
		}
		scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
		scored.truncate(top_k);

		Ok(scored
			.into_iter()
			.enumerate()
			.map(|(rank, (score, ordinal))| {
				let entry = &built.entries[ordinal];
				let mut result = RetrievalResult::new(entry.chunk_id.clone(), entry.content.clone(), entry.meta.clone(), score);
				result.lexical_score = Some(score);
				result.lexical_rank = Some(rank + 1);
				result
			})
			.collect())
	}
}
