//! LanceDB-backed dense retrieval over code chunks.

pub mod cache;
pub mod filter;
pub mod index;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use filter::{compile_filter, CompiledFilter};
pub use index::DenseIndex;
