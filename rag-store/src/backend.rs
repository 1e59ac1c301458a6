//! Vector engine seam.

use rag_core::{BoxFuture, CandidateIdSet, DocumentId, ScoredCandidate};

use crate::config::VectorSpace;
use crate::errors::RagError;
use crate::record::ChunkRecord;

/// Storage and constrained search of chunk vectors.
///
/// Implementations must only score points whose `doc_id` is in the given
/// candidate set.
pub trait VectorBackend: Send + Sync {
    /// Creates the collection if missing; fails with [`RagError::Config`]
    /// when an existing collection has a different dimension.
    fn ensure_ready<'a>(&'a self, space: &'a VectorSpace) -> BoxFuture<'a, Result<(), RagError>>;

    /// Replaces every chunk of `doc_id` with `chunks`; returns the number written.
    fn replace_chunks<'a>(
        &'a self,
        doc_id: &'a DocumentId,
        chunks: Vec<ChunkRecord>,
    ) -> BoxFuture<'a, Result<usize, RagError>>;

    /// Top `top_k` chunks by similarity, restricted to `candidates`.
    fn search<'a>(
        &'a self,
        vector: Vec<f32>,
        candidates: &'a CandidateIdSet,
        top_k: u64,
    ) -> BoxFuture<'a, Result<Vec<ScoredCandidate>, RagError>>;

    fn name(&self) -> &'static str;
}
