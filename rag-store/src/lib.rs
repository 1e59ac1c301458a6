//! Vector index adapter: filter-then-search over a candidate id set.
//!
//! This crate provides:
//! - [`RagStore::filtered_search`]: similarity search restricted to a
//!   [`CandidateIdSet`], never returning a document outside it
//! - [`RagStore::replace_document_chunks`]: embed-free chunk upserts that
//!   replace a document's previous chunks
//! - two backends behind [`VectorBackend`]: Qdrant and an in-memory index

mod backend;
mod config;
pub mod embed_pool;
mod errors;
mod filters;
mod memory;
mod qdrant_facade;
mod record;
mod retrieve;

pub use backend::VectorBackend;
pub use config::{BackendKind, DEFAULT_RETRIEVAL_WIDTH, DistanceKind, RagConfig, VectorSpace};
pub use errors::RagError;
pub use memory::InMemoryBackend;
pub use qdrant_facade::QdrantFacade;
pub use record::ChunkRecord;
pub use retrieve::{SearchOutcome, filtered_search};

use std::sync::Arc;

use rag_core::{CandidateIdSet, DocumentId, EmbeddingsProvider};
use tracing::{info, trace};

/// High-level facade wiring configuration, backend and query embedder.
///
/// This is the single entry point recommended for application code.
#[derive(Clone)]
pub struct RagStore {
    cfg: RagConfig,
    backend: Arc<dyn VectorBackend>,
    embedder: Arc<dyn EmbeddingsProvider>,
}

impl RagStore {
    /// Builds the backend selected by `cfg.backend`.
    ///
    /// # Errors
    /// Returns `RagError::Config` on invalid config or when the embedder's
    /// dimension differs from `cfg.embedding_dim`.
    pub fn new(cfg: RagConfig, embedder: Arc<dyn EmbeddingsProvider>) -> Result<Self, RagError> {
        cfg.validate()?;
        let backend: Arc<dyn VectorBackend> = match cfg.backend {
            BackendKind::Qdrant => Arc::new(QdrantFacade::new(&cfg)?),
            BackendKind::Memory => Arc::new(InMemoryBackend::new()),
        };
        Self::with_backend(cfg, backend, embedder)
    }

    /// Uses an explicit backend (tests, custom engines).
    pub fn with_backend(
        cfg: RagConfig,
        backend: Arc<dyn VectorBackend>,
        embedder: Arc<dyn EmbeddingsProvider>,
    ) -> Result<Self, RagError> {
        cfg.validate()?;
        if embedder.dimension() != cfg.embedding_dim {
            return Err(RagError::Config(format!(
                "embedder dimension {} differs from configured {}",
                embedder.dimension(),
                cfg.embedding_dim
            )));
        }
        trace!(backend = backend.name(), collection = %cfg.collection, "RagStore::with_backend");
        Ok(Self {
            cfg,
            backend,
            embedder,
        })
    }

    /// Creates or verifies the collection for the configured dimension.
    pub async fn ensure_ready(&self) -> Result<(), RagError> {
        self.backend.ensure_ready(&self.cfg.vector_space()).await?;
        info!(
            backend = self.backend.name(),
            dim = self.cfg.embedding_dim,
            "vector index ready"
        );
        Ok(())
    }

    /// Searches within `candidates` using the configured retrieval width
    /// unless `top_k` is given.
    pub async fn filtered_search(
        &self,
        candidates: &CandidateIdSet,
        query: &str,
        top_k: Option<u64>,
    ) -> Result<SearchOutcome, RagError> {
        let k = top_k.unwrap_or(self.cfg.retrieval_width);
        filtered_search(
            self.backend.as_ref(),
            self.embedder.as_ref(),
            candidates,
            query,
            k,
        )
        .await
    }

    /// Replaces all chunks of `doc_id` with pre-embedded `chunks`.
    pub async fn replace_document_chunks(
        &self,
        doc_id: &DocumentId,
        chunks: Vec<ChunkRecord>,
    ) -> Result<usize, RagError> {
        if let Some(bad) = chunks
            .iter()
            .find(|c| c.vector.len() != self.cfg.embedding_dim)
        {
            return Err(RagError::VectorSizeMismatch {
                got: bad.vector.len(),
                want: self.cfg.embedding_dim,
            });
        }
        self.backend.replace_chunks(doc_id, chunks).await
    }

    pub fn config(&self) -> &RagConfig {
        &self.cfg
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingsProvider> {
        &self.embedder
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}
