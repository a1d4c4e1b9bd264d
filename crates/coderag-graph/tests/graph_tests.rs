use std::collections::BTreeSet;

use coderag_core::types::SourceFile;
use coderag_graph::DependencyGraph;

fn py(path: &str, content: &str) -> SourceFile {
    SourceFile::new(path, content, "python")
}

fn chain() -> DependencyGraph {
    DependencyGraph::build(&[
        py("a.py", "from b import helper\n\ndef run():\n    return helper()\n"),
        py("b.py", "import c\n\ndef helper():\n    return c.VALUE\n"),
        py("c.py", "VALUE = 1\n"),
    ])
    .unwrap()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn chain_edges_and_neighbors() {
    let g = chain();
    assert!(!g.is_null());
    assert_eq!((g.node_count(), g.edge_count()), (3, 2));
    assert_eq!(g.dependencies("a.py"), vec!["b.py"]);
    assert_eq!(g.dependents("c.py"), vec!["b.py"]);
    assert!(g.dependencies("c.py").is_empty());
    assert_eq!(g.node("a.py").unwrap().functions, vec!["run"]);
}

#[test]
fn related_respects_depth_and_excludes_origin() {
    let g = chain();
    assert_eq!(g.related("a.py", 1), set(&["b.py"]));
    assert_eq!(g.related("a.py", 2), set(&["b.py", "c.py"]));
    assert_eq!(g.related("b.py", 1), set(&["a.py", "c.py"]));
    assert!(g.related("a.py", 0).is_empty());
    assert!(g.related("missing.py", 3).is_empty());
}

#[test]
fn degree_rankings() {
    let g = chain();
    assert_eq!(g.most_connected(1), vec![("b.py".to_string(), 2)]);
    assert_eq!(g.entry_points(), vec!["a.py"]);
    assert_eq!(g.core_modules(10), vec![("b.py".to_string(), 1), ("c.py".to_string(), 1)]);
}

#[test]
fn external_and_self_imports_add_no_edges() {
    let g = DependencyGraph::build(&[
        py("pkg/__init__.py", ""),
        py("pkg/core.py", "import os\nimport numpy as np\nfrom pkg import core\nfrom . import util\n"),
        py("pkg/util.py", "from .core import thing\nfrom .core import other\n"),
    ])
    .unwrap();
    assert_eq!(g.dependencies("pkg/core.py"), vec!["pkg/util.py"]);
    assert_eq!(g.dependencies("pkg/util.py"), vec!["pkg/core.py"]);
    assert_eq!(g.edge_count(), 2);
    assert_eq!(g.file_imports("pkg/core.py"), vec!["os", "numpy", "pkg", "."]);
}

#[test]
fn no_python_files_gives_null_graph() {
    let g = DependencyGraph::build(&[
        SourceFile::new("README.md", "# docs", "markdown"),
        SourceFile::new("main.js", "import x from './x'", "javascript"),
    ])
    .unwrap();
    assert!(g.is_null());
    assert!(g.dependencies("README.md").is_empty());
    assert!(g.dependents("main.js").is_empty());
    assert!(g.related("README.md", 2).is_empty());
    assert!(g.most_connected(5).is_empty());
    assert!(g.entry_points().is_empty());
    assert!(g.core_modules(5).is_empty());
}

#[test]
fn unparseable_files_are_skipped() {
    let g = DependencyGraph::build(&[py("ok.py", "import broken\n"), py("broken.py", "def (:\n")]).unwrap();
    assert_eq!(g.node_count(), 1);
    assert!(g.dependencies("ok.py").is_empty());
}
