//! Domain types shared by the lexical, dense and fusion stages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub type ChunkId = String;

/// Extended per-chunk metadata. Never stored inside an index entry.
pub type ExtendedMeta = BTreeMap<String, MetaValue>;

/// Exact-match conjunction over [`ChunkMeta`] fields.
pub type MetaFilter = BTreeMap<String, MetaValue>;

const MAX_STORED_IMPORTS: usize = 20;
const MAX_STORED_DOCSTRING: usize = 500;

/// Declared kind of a chunk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Module,
    Function,
    AsyncFunction,
    Method,
    Class,
    Docstring,
    Section,
}

impl ChunkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Function => "function",
            Self::AsyncFunction => "async_function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Docstring => "docstring",
            Self::Section => "section",
        }
    }

    /// Header label used in embedding text, e.g. `Async_Function`.
    pub fn title(self) -> String {
        self.as_str()
            .split('_')
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "module" => Self::Module,
            "function" => Self::Function,
            "async_function" => Self::AsyncFunction,
            "method" => Self::Method,
            "class" => Self::Class,
            "docstring" => Self::Docstring,
            "section" => Self::Section,
            other => return Err(Error::NotFound(format!("chunk kind '{other}'"))),
        })
    }
}

/// A flat scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view; whole finite floats count as integers.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    /// Equality with numbers normalized through [`MetaValue::as_int`], so
    /// `Float(3.0)` equals `Int(3)`.
    pub fn eq_loose(&self, other: &Self) -> bool {
        match (self.as_int(), other.as_int()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

/// The unit of retrieval, as produced by the chunker.
///
/// - `id`: stable key, unique within one index generation (see [`Chunk::make_id`])
/// - `content`: literal text used for tokenization and embedding
/// - `start_line`/`end_line`: 1-based, inclusive
/// - `metadata`: free-form extras; only `repo_name` and `docstring` are lifted
///   into the stored record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: ChunkId,
    pub file_path: String,
    pub content: String,
    pub kind: ChunkKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    pub language: String,
    #[serde(default)]
    pub imports: Vec<String>,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default)]
    pub metadata: ExtendedMeta,
}

impl Chunk {
    /// Build a chunk with a derived id and no optional attributes.
    pub fn new(
        file_path: impl Into<String>,
        kind: ChunkKind,
        name: Option<&str>,
        content: impl Into<String>,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        let file_path = file_path.into();
        Self {
            id: Self::make_id(&file_path, kind, name, start_line),
            file_path,
            content: content.into(),
            kind,
            name: name.map(str::to_string),
            parent: None,
            language: "python".to_string(),
            imports: Vec::new(),
            start_line,
            end_line,
            metadata: ExtendedMeta::new(),
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Deterministic id: `src/main.py` + function `run` at line 10 gives
    /// `src_main_py_function_run_10`.
    pub fn make_id(file_path: &str, kind: ChunkKind, name: Option<&str>, start_line: u32) -> ChunkId {
        let mut id = file_path.replace(['/', '.'], "_");
        id.push('_');
        id.push_str(kind.as_str());
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            id.push('_');
            id.push_str(name);
        }
        id.push('_');
        id.push_str(&start_line.to_string());
        id
    }

    /// Content prefixed with a small context header, as sent to the embedder.
    pub fn embedding_text(&self) -> String {
        let mut parts = vec![format!("# File: {}", self.file_path)];
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            parts.push(format!("# {}: {}", self.kind.title(), name));
        }
        if let Some(parent) = self.parent.as_deref().filter(|p| !p.is_empty()) {
            parts.push(format!("# Class: {parent}"));
        }
        parts.push(String::new());
        parts.push(self.content.clone());
        parts.join("\n")
    }

    /// Flatten into the fixed-shape record stored alongside index entries.
    pub fn meta(&self) -> ChunkMeta {
        let text_meta = |key: &str| self.metadata.get(key).and_then(MetaValue::as_str);
        ChunkMeta {
            file_path: self.file_path.clone(),
            chunk_type: self.kind,
            language: self.language.clone(),
            start_line: self.start_line,
            end_line: self.end_line,
            name: self.name.clone(),
            parent: self.parent.clone(),
            imports: self
                .imports
                .iter()
                .take(MAX_STORED_IMPORTS)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(","),
            repo_name: text_meta("repo_name").map(str::to_string),
            docstring: text_meta("docstring").map(|d| d.chars().take(MAX_STORED_DOCSTRING).collect()),
        }
    }

    /// Reject chunks that would corrupt an index.
    ///
    /// # Errors
    /// Returns [`Error::InvalidChunk`] for an empty id or content, a zero
    /// start line, or an inverted line range.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidChunk { id: self.id.clone(), reason: reason.to_string() };
        if self.id.is_empty() {
            return Err(invalid("empty id"));
        }
        if self.content.is_empty() {
            return Err(invalid("empty content"));
        }
        if self.start_line == 0 {
            return Err(invalid("line numbers are 1-based"));
        }
        if self.start_line > self.end_line {
            return Err(invalid(&format!(
                "start_line {} is after end_line {}",
                self.start_line, self.end_line
            )));
        }
        Ok(())
    }
}

/// Validate every chunk and reject duplicate ids.
///
/// # Errors
/// The first malformed chunk or repeated id, see [`Chunk::validate`].
pub fn validate_chunks(chunks: &[Chunk]) -> Result<()> {
    let mut seen = std::collections::HashSet::with_capacity(chunks.len());
    for chunk in chunks {
        chunk.validate()?;
        if !seen.insert(chunk.id.as_str()) {
            return Err(Error::DuplicateChunkId(chunk.id.clone()));
        }
    }
    Ok(())
}

/// Flat metadata record kept per index entry. All values are scalars;
/// `imports` is comma-joined.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMeta {
    pub file_path: String,
    pub chunk_type: ChunkKind,
    pub language: String,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub imports: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
}

impl ChunkMeta {
    pub const STRING_FIELDS: [&'static str; 8] = [
        "file_path",
        "chunk_type",
        "language",
        "name",
        "parent",
        "imports",
        "repo_name",
        "docstring",
    ];
    pub const INT_FIELDS: [&'static str; 2] = ["start_line", "end_line"];

    /// Field lookup for equality filtering. Unknown or unset fields give `None`.
    pub fn get(&self, field: &str) -> Option<MetaValue> {
        let text = |s: &str| Some(MetaValue::Str(s.to_string()));
        match field {
            "file_path" => text(&self.file_path),
            "chunk_type" => text(self.chunk_type.as_str()),
            "language" => text(&self.language),
            "start_line" => Some(MetaValue::Int(i64::from(self.start_line))),
            "end_line" => Some(MetaValue::Int(i64::from(self.end_line))),
            "name" => self.name.as_deref().and_then(text),
            "parent" => self.parent.as_deref().and_then(text),
            "imports" => text(&self.imports),
            "repo_name" => self.repo_name.as_deref().and_then(text),
            "docstring" => self.docstring.as_deref().and_then(text),
            _ => None,
        }
    }

    /// True when every filter entry equals the corresponding field.
    pub fn matches(&self, filter: &MetaFilter) -> bool {
        filter.iter().all(|(field, want)| self.get(field).is_some_and(|have| have.eq_loose(want)))
    }
}

/// Where a result came from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    #[default]
    Retrieved,
    /// Appended by dependency expansion; carries a fixed low score.
    Dependency,
}

/// The unit returned by every stage.
///
/// `score` is stage-specific but higher is always better. Ranks are 1-based
/// positions in the stage's own list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    pub chunk_id: ChunkId,
    pub content: String,
    pub metadata: ChunkMeta,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dense_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dense_rank: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexical_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexical_rank: Option<usize>,
    #[serde(default)]
    pub provenance: Provenance,
}

impl RetrievalResult {
    pub fn new(chunk_id: impl Into<ChunkId>, content: impl Into<String>, metadata: ChunkMeta, score: f32) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            content: content.into(),
            metadata,
            score,
            original_score: None,
            dense_score: None,
            dense_rank: None,
            lexical_score: None,
            lexical_rank: None,
            provenance: Provenance::Retrieved,
        }
    }

    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self::new(chunk.id.clone(), chunk.content.clone(), chunk.meta(), score)
    }

    pub fn is_dependency(&self) -> bool {
        self.provenance == Provenance::Dependency
    }
}

/// Stable sort by score descending; equal scores keep their input order.
pub fn sort_by_score(results: &mut [RetrievalResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// A source file handed to the dependency graph builder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
    pub language: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>, language: impl Into<String>) -> Self {
        Self { path: path.into(), content: content.into(), language: language.into() }
    }
}

/// Administrative view of the dense collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionStats {
    pub name: String,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_follows_path_kind_name_line() {
        let id = Chunk::make_id("src/main.py", ChunkKind::Function, Some("test_func"), 10);
        assert_eq!(id, "src_main_py_function_test_func_10");
        let anon = Chunk::make_id("README.md", ChunkKind::Section, None, 1);
        assert_eq!(anon, "README_md_section_1");
    }

    #[test]
    fn embedding_text_carries_header() {
        let chunk = Chunk::new("app/models.py", ChunkKind::Method, Some("save"), "def save(self): ...", 3, 4)
            .with_parent("User");
        let text = chunk.embedding_text();
        assert_eq!(text, "# File: app/models.py\n# Method: save\n# Class: User\n\ndef save(self): ...");
        assert_eq!(ChunkKind::AsyncFunction.title(), "Async_Function");
    }

    #[test]
    fn meta_truncates_imports_and_docstring() {
        let mut chunk = Chunk::new("a.py", ChunkKind::Module, None, "x = 1", 1, 1);
        chunk.imports = (0..30).map(|i| format!("m{i}")).collect();
        chunk.metadata.insert("docstring".into(), MetaValue::Str("d".repeat(900)));
        chunk.metadata.insert("repo_name".into(), "owner_repo".into());
        chunk.metadata.insert("stars".into(), MetaValue::Int(5));
        let meta = chunk.meta();
        assert_eq!(meta.imports.split(',').count(), 20);
        assert_eq!(meta.docstring.as_deref().map(str::len), Some(500));
        assert_eq!(meta.repo_name.as_deref(), Some("owner_repo"));
        assert_eq!(meta.get("stars"), None);
    }

    #[test]
    fn validation_rejects_bad_ranges_and_duplicates() {
        let ok = Chunk::new("a.py", ChunkKind::Function, Some("f"), "def f(): pass", 1, 2);
        let inverted = Chunk::new("a.py", ChunkKind::Function, Some("g"), "def g(): pass", 5, 2);
        assert!(matches!(inverted.validate(), Err(Error::InvalidChunk { .. })));
        assert!(matches!(
            validate_chunks(&[ok.clone(), ok.clone()]),
            Err(Error::DuplicateChunkId(id)) if id == ok.id
        ));
        assert!(validate_chunks(&[ok]).is_ok());
    }

    #[test]
    fn meta_filter_is_conjunction() {
        let meta = Chunk::new("a.py", ChunkKind::Class, Some("User"), "class User: pass", 1, 1).meta();
        let mut filter = MetaFilter::new();
        filter.insert("file_path".into(), "a.py".into());
        assert!(meta.matches(&filter));
        filter.insert("chunk_type".into(), "function".into());
        assert!(!meta.matches(&filter));
    }

    #[test]
    fn whole_floats_match_integer_fields() {
        let meta = Chunk::new("a.py", ChunkKind::Function, Some("f"), "def f(): pass", 3, 4).meta();
        let mut filter = MetaFilter::new();
        filter.insert("start_line".into(), MetaValue::Float(3.0));
        assert!(meta.matches(&filter));
        filter.insert("end_line".into(), MetaValue::Float(4.5));
        assert!(!meta.matches(&filter));
        assert!(MetaValue::Int(7).eq_loose(&MetaValue::Float(7.0)));
        assert!(!MetaValue::Str("7".into()).eq_loose(&MetaValue::Int(7)));
    }
}
