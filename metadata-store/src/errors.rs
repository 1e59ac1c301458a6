//! Error type for metadata operations.

use thiserror::Error;

/// Any failure of the relational backend.
///
/// A failed lookup is always an error, never an empty candidate set.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata backend error: {0}")]
    Backend(String),

    #[error("invalid metadata store config: {0}")]
    Config(String),
}

pub(crate) fn to_backend_err(e: impl std::fmt::Display) -> MetadataError {
    MetadataError::Backend(e.to_string())
}
