use std::path::PathBuf;

use metadata_store::MetadataError;
use rag_core::ServiceError;
use rag_store::RagError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("ingestion config error: {0}")]
    Config(String),

    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Vector(#[from] RagError),

    #[error(transparent)]
    Model(#[from] ServiceError),
}
