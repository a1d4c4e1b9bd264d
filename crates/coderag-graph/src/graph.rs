use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

use coderag_core::types::SourceFile;
use coderag_core::Result;

use crate::resolve::{normalize_path, ImportStmt, ModuleTable};

/// One parsed source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    pub path: String,
    pub functions: Vec<String>,
    pub classes: Vec<String>,
    pub imports: Vec<ImportStmt>,
}

#[derive(Debug)]
struct GraphInner {
    graph: DiGraph<FileNode, ()>,
    index: HashMap<String, NodeIndex>,
}

/// Directed import graph among Python files.
///
/// A null graph answers every query with an empty result.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    inner: Option<GraphInner>,
}

#[cfg(feature = "python")]
fn is_python(file: &SourceFile) -> bool {
    file.language.eq_ignore_ascii_case("python")
}

impl DependencyGraph {
    pub fn null() -> Self {
        Self::default()
    }

    /// Parse every Python file in `files` and link resolvable imports.
    ///
    /// # Errors
    /// [`coderag_core::Error::GraphUnavailable`] when compiled without the `python` feature.
    pub fn build(files: &[SourceFile]) -> Result<Self> {
        Self::build_parsed(files)
    }

    #[cfg(not(feature = "python"))]
    fn build_parsed(_files: &[SourceFile]) -> Result<Self> {
        tracing::warn!("python grammar not compiled in, dependency graph disabled");
        Err(coderag_core::Error::GraphUnavailable)
    }

    #[cfg(feature = "python")]
    fn build_parsed(files: &[SourceFile]) -> Result<Self> {
        let mut parser = crate::parse::PythonParser::new()?;
        let mut nodes = Vec::new();
        let mut skipped = 0usize;
        for file in files.iter().filter(|f| is_python(f)) {
            match parser.parse(&file.content) {
                Some(parsed) => nodes.push(FileNode {
                    path: normalize_path(&file.path),
                    functions: parsed.functions,
                    classes: parsed.classes,
                    imports: parsed.imports,
                }),
                None => {
                    skipped += 1;
                    tracing::debug!(path = %file.path, "python file did not parse, left out of the graph");
                }
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, "python files with syntax errors left out of the dependency graph");
        }
        Ok(Self::from_nodes(nodes))
    }

    /// Link pre-parsed nodes. Later duplicates of a path are ignored.
    pub fn from_nodes(nodes: Vec<FileNode>) -> Self {
        if nodes.is_empty() {
            tracing::info!("no python files, dependency graph is null");
            return Self::null();
        }
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut table = ModuleTable::default();
        for node in nodes {
            if index.contains_key(&node.path) {
                tracing::warn!(path = %node.path, "duplicate file path, keeping the first");
                continue;
            }
            table.insert(&node.path);
            let path = node.path.clone();
            index.insert(path, graph.add_node(node));
        }

        let mut edges = Vec::new();
        for source in graph.node_indices() {
            let node = &graph[source];
            for stmt in &node.imports {
                for target in table.resolve(stmt, &node.path) {
                    if let Some(&t) = index.get(&target) {
                        if t != source {
                            edges.push((source, t));
                        }
                    }
                }
            }
        }
        for (a, b) in edges {
            graph.update_edge(a, b, ());
        }
        tracing::info!(nodes = graph.node_count(), edges = graph.edge_count(), "dependency graph built");
        Self { inner: Some(GraphInner { graph, index }) }
    }

    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    pub fn node_count(&self) -> usize {
        self.inner.as_ref().map_or(0, |g| g.graph.node_count())
    }

    pub fn edge_count(&self) -> usize {
        self.inner.as_ref().map_or(0, |g| g.graph.edge_count())
    }

    fn lookup(&self, path: &str) -> Option<(&GraphInner, NodeIndex)> {
        let inner = self.inner.as_ref()?;
        let idx = *inner.index.get(&normalize_path(path))?;
        Some((inner, idx))
    }

    pub fn node(&self, path: &str) -> Option<&FileNode> {
        self.lookup(path).map(|(g, idx)| &g.graph[idx])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// Raw import targets as written, e.g. `os`, `..models`.
    pub fn file_imports(&self, path: &str) -> Vec<String> {
        self.node(path).map(|n| n.imports.iter().map(ImportStmt::display_module).collect()).unwrap_or_default()
    }

    fn neighbors(&self, path: &str, dir: Direction) -> Vec<String> {
        let Some((g, idx)) = self.lookup(path) else { return Vec::new() };
        let mut out: Vec<String> = g.graph.neighbors_directed(idx, dir).map(|n| g.graph[n].path.clone()).collect();
        out.sort();
        out
    }

    /// Files `path` imports.
    pub fn dependencies(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Outgoing)
    }

    /// Files importing `path`.
    pub fn dependents(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Incoming)
    }

    /// Files within `depth` hops in either direction, without `path` itself.
    pub fn related(&self, path: &str, depth: usize) -> BTreeSet<String> {
        let mut related = BTreeSet::new();
        let Some((g, origin)) = self.lookup(path) else { return related };
        let mut seen = vec![origin];
        let mut frontier = vec![origin];
        for _ in 0..depth {
            let mut next = Vec::new();
            for &n in &frontier {
                for m in g.graph.neighbors_undirected(n) {
                    if !seen.contains(&m) {
                        seen.push(m);
                        next.push(m);
                        related.insert(g.graph[m].path.clone());
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        related
    }

    /// Top `n` files by in-degree plus out-degree.
    pub fn most_connected(&self, n: usize) -> Vec<(String, usize)> {
        self.ranked(n, |g, idx| {
            g.graph.neighbors_directed(idx, Direction::Incoming).count() + g.graph.neighbors_directed(idx, Direction::Outgoing).count()
        })
    }

    /// Files nothing imports.
    pub fn entry_points(&self) -> Vec<String> {
        let Some(g) = &self.inner else { return Vec::new() };
        g.graph
            .node_indices()
            .filter(|&idx| g.graph.neighbors_directed(idx, Direction::Incoming).next().is_none())
            .map(|idx| g.graph[idx].path.clone())
            .collect()
    }

    /// Top `n` imported files by in-degree; files nobody imports are excluded.
    pub fn core_modules(&self, n: usize) -> Vec<(String, usize)> {
        let mut ranked = self.ranked(usize::MAX, |g, idx| g.graph.neighbors_directed(idx, Direction::Incoming).count());
        ranked.retain(|(_, d)| *d > 0);
        ranked.truncate(n);
        ranked
    }

    fn ranked(&self, n: usize, degree: impl Fn(&GraphInner, NodeIndex) -> usize) -> Vec<(String, usize)> {
        let Some(g) = &self.inner else { return Vec::new() };
        let mut out: Vec<(String, usize)> = g.graph.node_indices().map(|idx| (g.graph[idx].path.clone(), degree(g, idx))).collect();
        out.sort_by(|a, b| b.1.cmp(&a.1));
        out.truncate(n);
        out
    }
}
