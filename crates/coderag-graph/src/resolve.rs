//! Module naming and import resolution against the set of indexed files.

use std::collections::{HashMap, HashSet};

/// One import statement as written in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStmt {
    /// Dotted module path, empty for `from . import x`.
    pub module: String,
    /// Names pulled in by `from ... import`; empty for plain `import`.
    pub names: Vec<String>,
    /// Number of leading dots, 0 for absolute imports.
    pub level: usize,
    pub line: u32,
}

impl ImportStmt {
    pub fn is_relative(&self) -> bool {
        self.level > 0
    }

    /// The import as it would appear in source, e.g. `..pkg.mod`.
    pub fn display_module(&self) -> String {
        format!("{}{}", ".".repeat(self.level), self.module)
    }
}

pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// `pkg/sub/mod.py` -> `pkg.sub.mod`. `None` for non-`.py` paths.
pub fn module_name(path: &str) -> Option<String> {
    let path = normalize_path(path);
    let stem = path.strip_suffix(".py")?;
    Some(stem.trim_start_matches("./").replace('/', "."))
}

/// Maps dotted module names to file paths and answers resolution queries.
#[derive(Debug, Default)]
pub struct ModuleTable {
    by_module: HashMap<String, String>,
    paths: HashSet<String>,
}

impl ModuleTable {
    pub fn insert(&mut self, path: &str) {
        let path = normalize_path(path);
        if let Some(module) = module_name(&path) {
            if let Some(package) = module.strip_suffix(".__init__") {
                self.by_module.entry(package.to_string()).or_insert_with(|| path.clone());
            }
            self.by_module.entry(module).or_insert_with(|| path.clone());
        }
        self.paths.insert(path);
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    fn lookup_module(&self, dotted: &str) -> Option<&str> {
        self.by_module.get(dotted).map(String::as_str)
    }

    /// Longest dotted prefix of `module` that names an indexed file.
    fn lookup_prefix(&self, module: &str) -> Option<&str> {
        let parts: Vec<&str> = module.split('.').filter(|p| !p.is_empty()).collect();
        (1..=parts.len()).rev().find_map(|n| self.lookup_module(&parts[..n].join(".")))
    }

    fn lookup_file(&self, base: &str) -> Option<&str> {
        let with_slash = |s: &str| if base.is_empty() { s.to_string() } else { format!("{base}/{s}") };
        [format!("{base}.py"), with_slash("__init__.py")]
            .into_iter()
            .find_map(|candidate| self.paths.get(&candidate).map(String::as_str))
            .filter(|_| !base.is_empty())
    }

    /// Files `stmt` in `importer` refers to. Unresolvable imports yield nothing.
    pub fn resolve(&self, stmt: &ImportStmt, importer: &str) -> Vec<String> {
        let mut out = Vec::new();
        if stmt.is_relative() {
            let Some(dir) = climb(importer, stmt.level) else { return out };
            let join = |rest: &str| match (dir.is_empty(), rest.is_empty()) {
                (_, true) => dir.clone(),
                (true, false) => rest.to_string(),
                (false, false) => format!("{dir}/{rest}"),
            };
            if stmt.module.is_empty() {
                for name in &stmt.names {
                    if let Some(p) = self.lookup_file(&join(name)) {
                        out.push(p.to_string());
                    }
                }
            } else if let Some(p) = self.lookup_file(&join(&stmt.module.replace('.', "/"))) {
                out.push(p.to_string());
            }
        } else if stmt.names.is_empty() {
            if let Some(p) = self.lookup_prefix(&stmt.module) {
                out.push(p.to_string());
            }
        } else {
            let mut fell_back = false;
            for name in &stmt.names {
                if let Some(p) = self.lookup_module(&format!("{}.{name}", stmt.module)) {
                    out.push(p.to_string());
                } else if !fell_back {
                    fell_back = true;
                    if let Some(p) = self.lookup_prefix(&stmt.module) {
                        out.push(p.to_string());
                    }
                }
            }
        }
        out.dedup();
        out
    }
}

/// Directory `level - 1` steps above the importer's own directory.
fn climb(importer: &str, level: usize) -> Option<String> {
    let importer = normalize_path(importer);
    let mut parts: Vec<&str> = importer.split('/').collect();
    parts.pop();
    for _ in 1..level {
        parts.pop()?;
    }
    Some(parts.join("/"))
}
