//! Filter-then-search behavior of the vector index adapter.

use std::sync::Arc;

use proptest::prelude::*;
use rag_core::testing::HashingEmbedder;
use rag_core::{BoxFuture, CandidateIdSet, DocumentId, EmbeddingsProvider, ScoredCandidate};
use rag_store::{
    ChunkRecord, InMemoryBackend, RagConfig, RagError, RagStore, SearchOutcome, VectorBackend,
    VectorSpace, filtered_search,
};

const DIM: usize = 32;

fn store_with(backend: Arc<dyn VectorBackend>, embedder: Arc<HashingEmbedder>) -> RagStore {
    RagStore::with_backend(RagConfig::in_memory(DIM), backend, embedder).unwrap()
}

async fn put(store: &RagStore, embedder: &HashingEmbedder, path: &str, texts: &[&str]) -> DocumentId {
    let id = DocumentId::from_canonical(path);
    let chunks = texts
        .iter()
        .enumerate()
        .map(|(i, t)| ChunkRecord {
            doc_id: id.clone(),
            chunk_index: i as u32,
            text: t.to_string(),
            source_path: path.to_string(),
            vector: embedder.vector(t),
        })
        .collect();
    store.replace_document_chunks(&id, chunks).await.unwrap();
    id
}

#[tokio::test]
async fn empty_set_skips_embedding_and_search() {
    let embedder = Arc::new(HashingEmbedder::new(DIM));
    let store = store_with(Arc::new(InMemoryBackend::new()), embedder.clone());
    store.ensure_ready().await.unwrap();
    put(&store, &embedder, "a.md", &["asbestos exposure claim"]).await;
    let before = embedder.calls();

    let out = store
        .filtered_search(&CandidateIdSet::empty(100), "asbestos", None)
        .await
        .unwrap();

    assert_eq!(out, SearchOutcome::NoEligibleDocuments);
    assert_eq!(embedder.calls(), before);
}

#[tokio::test]
async fn excluded_document_never_appears_even_if_most_similar() {
    let embedder = Arc::new(HashingEmbedder::new(DIM));
    let store = store_with(Arc::new(InMemoryBackend::new()), embedder.clone());
    store.ensure_ready().await.unwrap();
    let exact = put(&store, &embedder, "exact.md", &["asbestos liability ruling"]).await;
    let allowed = put(&store, &embedder, "allowed.md", &["contract law and liability"]).await;

    let set = CandidateIdSet::from_ids([allowed.clone()], 100);
    let out = store
        .filtered_search(&set, "asbestos liability ruling", Some(10))
        .await
        .unwrap();

    let hits = out.hits();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_id, allowed);
    assert!(hits.iter().all(|h| h.doc_id != exact));
}

/// Backend that ignores the candidate set.
struct LeakyBackend {
    inner: InMemoryBackend,
    everything: CandidateIdSet,
}

impl VectorBackend for LeakyBackend {
    fn ensure_ready<'a>(&'a self, space: &'a VectorSpace) -> BoxFuture<'a, Result<(), RagError>> {
        self.inner.ensure_ready(space)
    }

    fn replace_chunks<'a>(
        &'a self,
        doc_id: &'a DocumentId,
        chunks: Vec<ChunkRecord>,
    ) -> BoxFuture<'a, Result<usize, RagError>> {
        self.inner.replace_chunks(doc_id, chunks)
    }

    fn search<'a>(
        &'a self,
        vector: Vec<f32>,
        _candidates: &'a CandidateIdSet,
        top_k: u64,
    ) -> BoxFuture<'a, Result<Vec<ScoredCandidate>, RagError>> {
        self.inner.search(vector, &self.everything, top_k)
    }

    fn name(&self) -> &'static str {
        "leaky"
    }
}

#[tokio::test]
async fn adapter_drops_hits_a_backend_leaks() {
    let embedder = Arc::new(HashingEmbedder::new(DIM));
    let a = DocumentId::from_canonical("a.md");
    let b = DocumentId::from_canonical("b.md");
    let backend = Arc::new(LeakyBackend {
        inner: InMemoryBackend::new(),
        everything: CandidateIdSet::from_ids([a.clone(), b.clone()], 10),
    });
    let store = store_with(backend, embedder.clone());
    put(&store, &embedder, "a.md", &["alpha text"]).await;
    put(&store, &embedder, "b.md", &["alpha text too"]).await;

    let only_b = CandidateIdSet::from_ids([b.clone()], 10);
    let out = store.filtered_search(&only_b, "alpha", None).await.unwrap();
    assert!(out.hits().iter().all(|h| h.doc_id == b));
    assert_eq!(out.hits().len(), 1);
}

#[tokio::test]
async fn wrong_dimension_embedder_is_rejected() {
    let embedder: Arc<dyn EmbeddingsProvider> = Arc::new(HashingEmbedder::new(DIM + 1));
    let res = RagStore::with_backend(
        RagConfig::in_memory(DIM),
        Arc::new(InMemoryBackend::new()),
        embedder,
    );
    assert!(matches!(res, Err(RagError::Config(_))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn hits_are_members_sorted_and_bounded(
        n_docs in 1usize..25,
        picks in proptest::collection::vec(any::<bool>(), 25),
        top_k in 1u64..60,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (hits, set) = rt.block_on(async {
            let embedder = HashingEmbedder::new(DIM);
            let backend = InMemoryBackend::new();
            let mut ids = Vec::new();
            for i in 0..n_docs {
                let id = DocumentId::from_canonical(&format!("d{i}.md"));
                let text = format!("topic {} shared words {}", i % 3, i);
                let chunks = vec![
                    ChunkRecord { doc_id: id.clone(), chunk_index: 0, text: text.clone(), source_path: String::new(), vector: embedder.vector(&text) },
                    ChunkRecord { doc_id: id.clone(), chunk_index: 1, text: "shared".into(), source_path: String::new(), vector: embedder.vector("shared") },
                ];
                backend.replace_chunks(&id, chunks).await.unwrap();
                ids.push(id);
            }
            let chosen: Vec<_> = ids.iter().zip(&picks).filter(|(_, p)| **p).map(|(id, _)| id.clone()).collect();
            let set = CandidateIdSet::from_ids(chosen, 100);
            let out = filtered_search(&backend, &embedder, &set, "shared words", top_k).await.unwrap();
            (out, set)
        });

        match hits {
            SearchOutcome::NoEligibleDocuments => prop_assert!(set.is_empty()),
            SearchOutcome::Hits(h) => {
                prop_assert!(h.len() as u64 <= top_k);
                prop_assert!(h.iter().all(|c| set.contains(&c.doc_id)));
                prop_assert!(h.windows(2).all(|w| w[0].score >= w[1].score));
            }
        }
    }
}
