//! coderag-text
//!
//! Lexical retrieval: a code-aware tokenizer feeding a BM25 index held in a
//! Tantivy RAM directory. Chunks whose content yields no tokens are skipped.

pub mod index;
pub mod tantivy_utils;
pub mod tokenize;

pub use index::LexicalIndex;
pub use tokenize::tokenize;
