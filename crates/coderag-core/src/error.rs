use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid chunk '{id}': {reason}")]
    InvalidChunk { id: String, reason: String },

    #[error("Duplicate chunk id: {0}")]
    DuplicateChunkId(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Lexical index error: {0}")]
    Lexical(String),

    #[error("Dense index error: {0}")]
    Dense(String),

    /// The embedding provider failed. Raised while building aborts the build.
    #[error("Embedding failed: {0:#}")]
    Embedding(#[source] anyhow::Error),

    #[error("Model error: {0:#}")]
    Model(#[source] anyhow::Error),

    #[error("Dependency graph error: {0}")]
    Graph(String),

    /// Built without a parser for the graph's source language.
    #[error("Dependency graph support is not compiled in")]
    GraphUnavailable,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
