use tree_sitter::{Node, Parser};

use coderag_core::{Error, Result};

use crate::resolve::ImportStmt;

/// Top-level facts of one Python file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    pub imports: Vec<ImportStmt>,
    pub functions: Vec<String>,
    pub classes: Vec<String>,
}

pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| Error::Graph(format!("failed to load Python grammar: {e}")))?;
        Ok(Self { parser })
    }

    /// `None` when the source does not parse cleanly.
    pub fn parse(&mut self, source: &str) -> Option<ParsedFile> {
        let tree = self.parser.parse(source, None)?;
        let root = tree.root_node();
        if root.has_error() {
            return None;
        }
        let mut parsed = ParsedFile::default();
        let count = u32::try_from(root.named_child_count()).unwrap_or(u32::MAX);
        for i in 0..count {
            let Some(child) = root.named_child(i) else { continue };
            visit_top_level(child, source, &mut parsed);
        }
        Some(parsed)
    }
}

fn text<'s>(node: Node, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

fn line(node: Node) -> u32 {
    u32::try_from(node.start_position().row + 1).unwrap_or(u32::MAX)
}

fn visit_top_level(node: Node, source: &str, out: &mut ParsedFile) {
    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                out.imports.push(ImportStmt { module: imported_module(name, source), names: Vec::new(), level: 0, line: line(node) });
            }
        }
        "import_from_statement" => {
            let Some(module_node) = node.child_by_field_name("module_name") else { return };
            let (level, module) = split_relative(text(module_node, source));
            let mut cursor = node.walk();
            let mut names: Vec<String> = node
                .children_by_field_name("name", &mut cursor)
                .map(|n| imported_module(n, source))
                .collect();
            let mut inner = node.walk();
            if node.named_children(&mut inner).any(|c| c.kind() == "wildcard_import") {
                names.push("*".to_string());
            }
            out.imports.push(ImportStmt { module, names, level, line: line(node) });
        }
        "function_definition" => {
            if let Some(name) = node.child_by_field_name("name") {
                out.functions.push(text(name, source).to_string());
            }
        }
        "class_definition" => {
            if let Some(name) = node.child_by_field_name("name") {
                out.classes.push(text(name, source).to_string());
            }
        }
        "decorated_definition" => {
            if let Some(def) = node.child_by_field_name("definition") {
                visit_top_level(def, source, out);
            }
        }
        _ => {}
    }
}

/// `a.b as c` -> `a.b`; `a.b` -> `a.b`.
fn imported_module(node: Node, source: &str) -> String {
    let target = if node.kind() == "aliased_import" { node.child_by_field_name("name").unwrap_or(node) } else { node };
    text(target, source).split_whitespace().collect()
}

/// `..pkg.mod` -> `(2, "pkg.mod")`.
fn split_relative(raw: &str) -> (usize, String) {
    let raw: String = raw.split_whitespace().collect();
    let level = raw.chars().take_while(|c| *c == '.').count();
    (level, raw[level..].to_string())
}
