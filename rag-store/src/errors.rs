//! Unified error types for the crate.

use rag_core::ServiceError;
use thiserror::Error;

/// Top-level error for rag-store operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid or unsupported configuration, including a collection whose
    /// dimension differs from the configured one.
    #[error("config error: {0}")]
    Config(String),

    /// Vector length differs from the collection dimension.
    #[error("vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },

    /// Embedding the query or a chunk failed.
    #[error("embedding error: {0}")]
    Embedding(#[from] ServiceError),

    /// Vector engine failure (Qdrant client errors, poisoned index).
    #[error("vector backend error: {0}")]
    Backend(String),
}
