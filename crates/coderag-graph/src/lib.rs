//! Static import graph over Python source files.
//!
//! Files are parsed with tree-sitter; only module-level imports and
//! declarations are read. Imports that do not name another indexed file
//! (stdlib, third-party, unresolvable relatives) produce no edge.

mod graph;
#[cfg(feature = "python")]
pub mod parse;
pub mod resolve;

pub use graph::{DependencyGraph, FileNode};
pub use resolve::{module_name, ImportStmt};
