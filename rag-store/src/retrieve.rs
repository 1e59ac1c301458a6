//! Candidate-constrained similarity search.

use rag_core::{CandidateIdSet, EmbeddingsProvider, ScoredCandidate, sort_by_rank};
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::backend::VectorBackend;
use crate::errors::RagError;

/// Result of a filtered search.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "hits", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// The candidate set was empty; nothing was embedded or searched.
    NoEligibleDocuments,
    /// Ranked hits, all members of the candidate set. May be empty.
    Hits(Vec<ScoredCandidate>),
}

impl SearchOutcome {
    pub fn hits(&self) -> &[ScoredCandidate] {
        match self {
            SearchOutcome::NoEligibleDocuments => &[],
            SearchOutcome::Hits(h) => h,
        }
    }

    pub fn into_hits(self) -> Vec<ScoredCandidate> {
        match self {
            SearchOutcome::NoEligibleDocuments => Vec::new(),
            SearchOutcome::Hits(h) => h,
        }
    }
}

/// Embeds `query` and searches only within `candidates`.
///
/// Hits are ordered by descending score with ties broken by
/// `(doc_id, chunk_index)`. Any hit outside the set is dropped and logged.
///
/// # Errors
/// Embedding failures and backend failures are propagated.
#[instrument(skip_all, fields(candidates = candidates.len(), top_k = top_k))]
pub async fn filtered_search(
    backend: &dyn VectorBackend,
    embedder: &dyn EmbeddingsProvider,
    candidates: &CandidateIdSet,
    query: &str,
    top_k: u64,
) -> Result<SearchOutcome, RagError> {
    if candidates.is_empty() {
        debug!("empty candidate set; skipping search");
        return Ok(SearchOutcome::NoEligibleDocuments);
    }
    if top_k == 0 {
        return Ok(SearchOutcome::Hits(Vec::new()));
    }

    let qv = embedder.embed(query).await?;
    let raw = backend.search(qv, candidates, top_k).await?;

    let before = raw.len();
    let mut hits: Vec<ScoredCandidate> = raw
        .into_iter()
        .filter(|h| {
            let ok = candidates.contains(&h.doc_id);
            if !ok {
                error!(doc_id = %h.doc_id, backend = backend.name(), "hit outside candidate set dropped");
            }
            ok
        })
        .collect();
    sort_by_rank(&mut hits);
    hits.truncate(usize::try_from(top_k).unwrap_or(usize::MAX));

    debug!(raw = before, kept = hits.len(), "filtered search done");
    Ok(SearchOutcome::Hits(hits))
}
