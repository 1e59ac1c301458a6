//! In-process brute-force vector index.
//!
//! Chunks are grouped by document, so a search only visits documents of the
//! candidate set. Suitable for tests and small local corpora.

use std::collections::HashMap;
use std::sync::RwLock;

use rag_core::embed::cosine;
use rag_core::{BoxFuture, CandidateIdSet, DocumentId, ScoredCandidate, sort_by_rank};
use tracing::debug;

use crate::backend::VectorBackend;
use crate::config::VectorSpace;
use crate::errors::RagError;
use crate::record::ChunkRecord;

#[derive(Default)]
pub struct InMemoryBackend {
    docs: RwLock<HashMap<DocumentId, Vec<ChunkRecord>>>,
    dim: RwLock<Option<usize>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored chunks.
    pub fn len(&self) -> usize {
        self.docs
            .read()
            .map(|d| d.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Chunk indices stored for one document, ascending.
    pub fn chunk_indices(&self, doc_id: &DocumentId) -> Vec<u32> {
        let mut v: Vec<u32> = self
            .docs
            .read()
            .ok()
            .and_then(|d| d.get(doc_id).map(|c| c.iter().map(|r| r.chunk_index).collect()))
            .unwrap_or_default();
        v.sort_unstable();
        v
    }
}

fn poisoned() -> RagError {
    RagError::Backend("in-memory index lock poisoned".into())
}

impl VectorBackend for InMemoryBackend {
    fn ensure_ready<'a>(&'a self, space: &'a VectorSpace) -> BoxFuture<'a, Result<(), RagError>> {
        let res = (|| {
            let mut dim = self.dim.write().map_err(|_| poisoned())?;
            match *dim {
                Some(d) if d != space.size => Err(RagError::Config(format!(
                    "in-memory index has dimension {d}, configured {}",
                    space.size
                ))),
                Some(_) => Ok(()),
                None => {
                    *dim = Some(space.size);
                    Ok(())
                }
            }
        })();
        Box::pin(async move { res })
    }

    fn replace_chunks<'a>(
        &'a self,
        doc_id: &'a DocumentId,
        chunks: Vec<ChunkRecord>,
    ) -> BoxFuture<'a, Result<usize, RagError>> {
        let res = (|| {
            let want = *self.dim.read().map_err(|_| poisoned())?;
            if let Some(want) = want {
                if let Some(bad) = chunks.iter().find(|c| c.vector.len() != want) {
                    return Err(RagError::VectorSizeMismatch {
                        got: bad.vector.len(),
                        want,
                    });
                }
            }
            if let Some(foreign) = chunks.iter().find(|c| &c.doc_id != doc_id) {
                return Err(RagError::Backend(format!(
                    "chunk of {} passed for {doc_id}",
                    foreign.doc_id
                )));
            }
            let n = chunks.len();
            let mut docs = self.docs.write().map_err(|_| poisoned())?;
            if chunks.is_empty() {
                docs.remove(doc_id);
            } else {
                docs.insert(doc_id.clone(), chunks);
            }
            Ok(n)
        })();
        Box::pin(async move { res })
    }

    fn search<'a>(
        &'a self,
        vector: Vec<f32>,
        candidates: &'a CandidateIdSet,
        top_k: u64,
    ) -> BoxFuture<'a, Result<Vec<ScoredCandidate>, RagError>> {
        let res = self.docs.read().map_err(|_| poisoned()).map(|docs| {
            let mut hits: Vec<ScoredCandidate> = candidates
                .iter()
                .filter_map(|id| docs.get(id))
                .flatten()
                .map(|rec| rec.to_candidate(cosine(&vector, &rec.vector)))
                .collect();
            sort_by_rank(&mut hits);
            hits.truncate(usize::try_from(top_k).unwrap_or(usize::MAX));
            debug!(candidates = candidates.len(), hits = hits.len(), "in-memory search");
            hits
        });
        Box::pin(async move { res })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DistanceKind;

    fn rec(doc: &str, idx: u32, v: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            doc_id: DocumentId::from_raw(doc),
            chunk_index: idx,
            text: format!("{doc}#{idx}"),
            source_path: format!("{doc}.md"),
            vector: v,
        }
    }

    fn space(size: usize) -> VectorSpace {
        VectorSpace {
            size,
            distance: DistanceKind::Cosine,
        }
    }

    #[tokio::test]
    async fn dimension_is_pinned() {
        let b = InMemoryBackend::new();
        b.ensure_ready(&space(2)).await.unwrap();
        assert!(matches!(b.ensure_ready(&space(3)).await, Err(RagError::Config(_))));
        let id = DocumentId::from_raw("a");
        let err = b.replace_chunks(&id, vec![rec("a", 0, vec![1.0; 3])]).await;
        assert!(matches!(err, Err(RagError::VectorSizeMismatch { got: 3, want: 2 })));
    }

    #[tokio::test]
    async fn replace_drops_stale_chunks() {
        let b = InMemoryBackend::new();
        let id = DocumentId::from_raw("a");
        b.replace_chunks(&id, vec![rec("a", 0, vec![1.0, 0.0]), rec("a", 1, vec![0.0, 1.0])])
            .await
            .unwrap();
        b.replace_chunks(&id, vec![rec("a", 0, vec![1.0, 0.0])]).await.unwrap();
        assert_eq!(b.chunk_indices(&id), vec![0]);
        assert_eq!(b.len(), 1);
    }

    #[tokio::test]
    async fn search_only_visits_candidates() {
        let b = InMemoryBackend::new();
        for (doc, v) in [("a", vec![1.0, 0.0]), ("b", vec![0.9, 0.1]), ("c", vec![1.0, 0.0])] {
            let id = DocumentId::from_raw(doc);
            b.replace_chunks(&id, vec![rec(doc, 0, v)]).await.unwrap();
        }
        let set = CandidateIdSet::from_ids(["a", "b"].map(DocumentId::from_raw), 10);
        let hits = b.search(vec![1.0, 0.0], &set, 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| set.contains(&h.doc_id)));
        assert_eq!(hits[0].doc_id.as_str(), "a");
    }
}
