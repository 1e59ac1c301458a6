//! Typed errors for the contextor crate.

use std::time::Duration;

use metadata_store::MetadataError;
use rag_core::ServiceError;
use rag_store::RagError;
use thiserror::Error;

use crate::api_types::Stage;

/// Failure of a whole turn.
#[derive(Debug, Error)]
pub enum TurnError {
    /// Invalid wiring or settings; not retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Metadata store, vector index or embedding failure, after the retry.
    #[error("backing store failed during {stage:?}: {message}")]
    BackingStore { stage: Stage, message: String },

    /// The turn deadline elapsed; in-flight work was cancelled.
    #[error("turn exceeded its deadline of {0:?}")]
    Timeout(Duration),

    /// The synthesis model failed to produce an answer.
    #[error("answer synthesis failed: {0}")]
    Synthesis(String),
}

impl TurnError {
    pub(crate) fn from_metadata(err: MetadataError) -> Self {
        match err {
            MetadataError::Config(m) => TurnError::Configuration(m),
            MetadataError::Backend(m) => TurnError::BackingStore {
                stage: Stage::MetadataLookup,
                message: m,
            },
        }
    }

    pub(crate) fn from_vector(err: RagError) -> Self {
        match err {
            RagError::Config(m) => TurnError::Configuration(m),
            other => TurnError::BackingStore {
                stage: Stage::FilteredSearch,
                message: other.to_string(),
            },
        }
    }

    pub(crate) fn is_backing_store(&self) -> bool {
        matches!(self, TurnError::BackingStore { .. })
    }
}

/// Failure of a reranking pass.
#[derive(Debug, Error)]
pub enum RerankError {
    #[error("rerank model call failed: {0}")]
    Model(#[from] ServiceError),

    #[error("unusable relevance score '{0}'")]
    Parse(String),

    #[error("rerank embedding failed: {0}")]
    Embedding(#[from] RagError),
}
