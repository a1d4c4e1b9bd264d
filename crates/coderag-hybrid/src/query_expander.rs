//! Synonym-driven query rewriting and multi-query retrieval.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;

use coderag_core::traits::{TextIndexer, VectorIndexer};
use coderag_core::types::RetrievalResult;
use coderag_core::Result;

use crate::retriever::{HybridRetriever, SearchOptions};

/// Code vocabulary and the words people use for it.
pub const SYNONYMS: &[(&str, &[&str])] = &[
    ("function", &["method", "def", "func", "procedure"]),
    ("class", &["object", "type", "model"]),
    ("variable", &["var", "param", "parameter", "argument", "arg"]),
    ("return", &["returns", "output", "result"]),
    ("error", &["exception", "bug", "issue", "problem"]),
    ("create", &["make", "build", "generate", "construct", "init", "initialize"]),
    ("delete", &["remove", "destroy", "drop"]),
    ("get", &["fetch", "retrieve", "obtain", "read", "load"]),
    ("set", &["update", "modify", "change", "write", "save"]),
    ("list", &["array", "collection", "items"]),
    ("dict", &["dictionary", "map", "mapping", "hash"]),
    ("config", &["configuration", "settings", "options"]),
    ("auth", &["authentication", "login", "authorize"]),
    ("db", &["database", "storage", "data"]),
    ("api", &["endpoint", "route", "interface"]),
    ("test", &["testing", "unittest", "spec"]),
    ("async", &["asynchronous", "await", "concurrent"]),
];

const MAX_QUERIES: usize = 4;
const SYNONYMS_PER_KEY: usize = 2;

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid regex"));
static CAMEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[a-z]+(?:[A-Z][a-z]+)+\b").expect("valid regex"));
static SNAKE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[a-z]+(?:_[a-z]+)+\b").expect("valid regex"));
static PASCAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+(?:[A-Z][a-z]+)+\b").expect("valid regex"));
static PY_FILE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\.py\b").expect("valid regex"));

fn push_unique(queries: &mut Vec<String>, q: String) {
    if !queries.contains(&q) {
        queries.push(q);
    }
}

/// Identifier-shaped words found in a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CodeEntities {
    /// camelCase then snake_case words.
    pub function_names: Vec<String>,
    /// PascalCase words.
    pub class_names: Vec<String>,
    /// `name.py` mentions.
    pub file_patterns: Vec<String>,
}

pub struct QueryExpander {
    forward: HashMap<&'static str, &'static [&'static str]>,
    reverse: HashMap<&'static str, &'static str>,
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryExpander {
    pub fn new() -> Self {
        let forward: HashMap<_, _> = SYNONYMS.iter().copied().collect();
        let mut reverse = HashMap::new();
        for (key, values) in SYNONYMS {
            for v in *values {
                reverse.insert(*v, *key);
            }
        }
        Self { forward, reverse }
    }

    /// The query itself followed by synonym rewrites, at most four in all.
    ///
    /// Rewrites work on the lowercased query and replace every occurrence
    /// of the word as a substring.
    pub fn expand(&self, query: &str) -> Vec<String> {
        let mut queries = vec![query.to_string()];
        let lower = query.to_lowercase();
        for word in WORD_RE.find_iter(&lower).map(|m| m.as_str()) {
            if let Some(synonyms) = self.forward.get(word) {
                for synonym in synonyms.iter().take(SYNONYMS_PER_KEY) {
                    push_unique(&mut queries, lower.replace(word, synonym));
                }
            } else if let Some(key) = self.reverse.get(word) {
                push_unique(&mut queries, lower.replace(word, key));
            }
        }
        queries.truncate(MAX_QUERIES);
        queries
    }

    pub fn extract_code_entities(&self, query: &str) -> CodeEntities {
        let all = |re: &Regex| re.find_iter(query).map(|m| m.as_str().to_string()).collect::<Vec<_>>();
        let mut function_names = all(&CAMEL_RE);
        function_names.extend(all(&SNAKE_RE));
        CodeEntities { function_names, class_names: all(&PASCAL_RE), file_patterns: all(&PY_FILE_RE) }
    }
}

/// A result accumulated over several query variants.
#[derive(Debug, Clone, Serialize)]
pub struct MultiQueryHit {
    #[serde(flatten)]
    pub result: RetrievalResult,
    pub matched_queries: Vec<String>,
}

/// Runs every expansion of a query and sums weighted scores per chunk.
pub struct MultiQueryRetriever<'a, TI: TextIndexer, VI: VectorIndexer> {
    base: &'a HybridRetriever<TI, VI>,
    expander: QueryExpander,
}

impl<'a, TI: TextIndexer, VI: VectorIndexer> MultiQueryRetriever<'a, TI, VI> {
    pub const PRIMARY_WEIGHT: f32 = 1.0;
    pub const VARIANT_WEIGHT: f32 = 0.5;

    pub fn new(base: &'a HybridRetriever<TI, VI>) -> Self {
        Self { base, expander: QueryExpander::new() }
    }

    /// # Errors
    /// The first failing variant search.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<MultiQueryHit>> {
        let queries = self.expander.expand(query);
        let mut hits: Vec<MultiQueryHit> = Vec::new();
        let mut position: HashMap<String, usize> = HashMap::new();
        for (i, q) in queries.iter().enumerate() {
            let weight = if i == 0 { Self::PRIMARY_WEIGHT } else { Self::VARIANT_WEIGHT };
            for mut r in self.base.search(q, &SearchOptions::top_k(top_k))? {
                r.score *= weight;
                match position.get(&r.chunk_id) {
                    Some(&at) => {
                        hits[at].result.score += r.score;
                        hits[at].matched_queries.push(q.clone());
                    }
                    None => {
                        position.insert(r.chunk_id.clone(), hits.len());
                        hits.push(MultiQueryHit { result: r, matched_queries: vec![q.clone()] });
                    }
                }
            }
        }
        tracing::debug!(variants = queries.len(), hits = hits.len(), "multi-query search");
        hits.sort_by(|a, b| b.result.score.total_cmp(&a.result.score));
        hits.truncate(top_k);
        Ok(hits)
    }
}
