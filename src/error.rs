//! Error taxonomy for the retrieval core.
//!
//! Strategy-level errors are caught at the orchestrator boundary and
//! reported per strategy; a failure in one strategy never aborts the
//! others. [`RetrievalError::CollectionNotFound`] is treated as an empty
//! result set by the orchestrator, and [`RetrievalError::QuerySyntax`] is
//! recoverable: the line matcher falls back to a literal substring match.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The embedding backend could not be reached or returned a non-2xx
    /// status. Not retried; propagates to the caller of ingestion or
    /// semantic search.
    #[error("embedding backend error: {0}")]
    EmbeddingBackend(String),

    /// Read or write failure on a collection's persistent store.
    #[error("store I/O error: {0}")]
    StoreIo(#[from] sqlx::Error),

    /// Filesystem failure while reading collection source files.
    #[error("source I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The named collection has neither a source directory nor a store.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// The boolean query expression could not be parsed.
    #[error("query syntax error: {0}")]
    QuerySyntax(String),
}

pub type Result<T, E = RetrievalError> = std::result::Result<T, E>;
