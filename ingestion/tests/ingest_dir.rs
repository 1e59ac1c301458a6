//! Directory ingestion against in-memory stores.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use ingestion::{IngestConfig, IngestionPipeline};
use metadata_store::{MetadataQuery, MetadataStore, SqliteMetadataStore};
use rag_core::testing::{FnGenerator, HashingEmbedder};
use rag_core::{BoxFuture, CandidateIdSet, DocumentId, ScoredCandidate, ServiceError, TextGenerator};
use rag_store::{ChunkRecord, InMemoryBackend, RagConfig, RagError, RagStore, VectorBackend, VectorSpace};
use tempfile::TempDir;

const DIM: usize = 16;

struct Env {
    dir: TempDir,
    meta: Arc<SqliteMetadataStore>,
    backend: Arc<InMemoryBackend>,
    vectors: RagStore,
}

fn env() -> Env {
    let backend = Arc::new(InMemoryBackend::new());
    let vectors = RagStore::with_backend(
        RagConfig::in_memory(DIM),
        backend.clone(),
        Arc::new(HashingEmbedder::new(DIM)),
    )
    .unwrap();
    Env {
        dir: TempDir::new().unwrap(),
        meta: Arc::new(SqliteMetadataStore::open_in_memory(100).unwrap()),
        backend,
        vectors,
    }
}

fn write(root: &Path, rel: &str, content: &[u8]) {
    let p = root.join(rel);
    if let Some(parent) = p.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(p, content).unwrap();
}

/// Id of `rel` under `root`, as ingestion derives it.
fn id_of(root: &Path, rel: &str) -> DocumentId {
    DocumentId::from_source_path(&root.canonicalize().unwrap().join(rel))
}

fn pipeline(env: &Env, cfg: IngestConfig) -> IngestionPipeline {
    IngestionPipeline::new(cfg, env.meta.clone(), env.vectors.clone()).unwrap()
}

#[tokio::test]
async fn ingests_text_and_counts_skips() {
    let env = env();
    let root = env.dir.path();
    write(
        root,
        "cases/asbestos.md",
        b"---\ntopic: asbestos litigation\ndate: 2021-06-30\njurisdiction: Tort-Law\n---\n# Smith v. Acme\nExposure claims.",
    );
    write(root, "notes/garden.txt", b"Tomatoes need sun.\nWater daily.");
    write(root, "empty.md", b"   \n");
    write(root, "blob.md", &[0xff, 0xfe, 0x00, 0x01]);
    write(root, "image.png", b"not really a png");
    write(root, ".git/config", b"ignored");

    let report = pipeline(&env, IngestConfig::default()).run(root).await.unwrap();

    assert_eq!(report.ingested, 2);
    assert_eq!(report.skipped, 3);
    assert!(report.failed.is_empty());
    assert_eq!(env.meta.count_documents().await.unwrap(), 2);

    let id = id_of(root, "cases/asbestos.md");
    let doc = env.meta.get_document(&id).await.unwrap().unwrap();
    assert_eq!(doc.topic, "asbestos litigation");
    assert_eq!(doc.title, "Smith v. Acme");
    assert_eq!(doc.jurisdiction, "tort-law");
    assert_eq!(doc.date, NaiveDate::from_ymd_opt(2021, 6, 30).unwrap());

    let garden = id_of(root, "notes/garden.txt");
    let doc = env.meta.get_document(&garden).await.unwrap().unwrap();
    assert_eq!(doc.jurisdiction, "personal");
    assert_eq!(doc.topic, "Tomatoes need sun.");

    let set = env
        .meta
        .find_documents(&MetadataQuery::parse("jurisdiction:tort-law asbestos"))
        .await
        .unwrap();
    assert!(set.contains(&id));
    assert_eq!(set.len(), 1);
}

#[tokio::test]
async fn reingest_replaces_stale_chunks() {
    let env = env();
    let root = env.dir.path();
    let long: String = (0..40).map(|i| format!("Paragraph {i} about leases. ")).collect();
    write(root, "lease.md", long.as_bytes());

    let cfg = IngestConfig {
        chunk_chars: 200,
        chunk_overlap: 20,
        cluster: false,
        ..IngestConfig::default()
    };
    let id = id_of(root, "lease.md");

    pipeline(&env, cfg.clone()).run(root).await.unwrap();
    let before = env.backend.chunk_indices(&id);
    assert!(before.len() > 2);

    write(root, "lease.md", b"Short lease now.");
    let report = pipeline(&env, cfg).run(root).await.unwrap();

    assert_eq!(report.ingested, 1);
    assert_eq!(env.backend.chunk_indices(&id), vec![0]);
    assert_eq!(env.meta.count_documents().await.unwrap(), 1);
}

#[tokio::test]
async fn clusters_are_named_and_assigned() {
    let env = env();
    let root = env.dir.path();
    write(root, "a.md", b"contract indemnity clause lease");
    write(root, "b.md", b"contract lease clause terms");
    write(root, "c.md", b"tomato garden soil compost");
    write(root, "d.md", b"garden compost tomato water");

    let namer: Arc<dyn TextGenerator> = Arc::new(FnGenerator(|prompt: &str| {
        Ok(if prompt.contains("tomato") { "Garden Notes" } else { "Legal Docs" }.to_string())
    }));
    let report = pipeline(&env, IngestConfig::default())
        .with_auxiliary(namer)
        .run(root)
        .await
        .unwrap();

    assert!(!report.clusters.is_empty() && report.clusters.len() <= 2);
    let total: usize = report.clusters.iter().map(|c| c.member_count).sum();
    assert_eq!(total, 4);
    assert_eq!(env.meta.list_clusters().await.unwrap(), report.clusters);
    for c in &report.clusters {
        assert!(["garden_notes", "legal_docs"].iter().any(|n| c.name.starts_with(n)));
    }
    for path in ["a.md", "b.md", "c.md", "d.md"] {
        let doc = env
            .meta
            .get_document(&id_of(root, path))
            .await
            .unwrap()
            .unwrap();
        assert!(doc.cluster_id.is_some());
    }
}

#[tokio::test]
async fn classification_fills_missing_jurisdiction() {
    let env = env();
    let root = env.dir.path();
    write(root, "story.md", b"Once upon a time a dragon slept.");
    write(
        root,
        "memo.md",
        b"---\njurisdiction: contract-law\n---\nMemo body.",
    );

    let classifier: Arc<dyn TextGenerator> = Arc::new(FnGenerator(|prompt: &str| {
        if prompt.contains("Classify") {
            Ok("fiction".to_string())
        } else {
            Err(ServiceError::Upstream("naming offline".into()))
        }
    }));
    let cfg = IngestConfig {
        classify: true,
        ..IngestConfig::default()
    };
    let report = pipeline(&env, cfg)
        .with_auxiliary(classifier)
        .run(root)
        .await
        .unwrap();
    assert_eq!(report.ingested, 2);

    let story = env
        .meta
        .get_document(&id_of(root, "story.md"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(story.jurisdiction, "fiction");
    let memo = env
        .meta
        .get_document(&id_of(root, "memo.md"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(memo.jurisdiction, "contract-law");
    assert!(report.clusters.iter().all(|c| c.name.starts_with("cluster_")));
}

#[tokio::test]
async fn same_relative_path_in_two_roots_keeps_both() {
    let env = env();
    let r1 = env.dir.path().join("2023");
    let r2 = env.dir.path().join("2024");
    write(&r1, "notes.md", b"---\ntopic: asbestos litigation\n---\nExposure claims.");
    write(&r2, "notes.md", b"---\ntopic: contract law\n---\nIndemnity clause.");
    let cfg = IngestConfig {
        cluster: false,
        ..IngestConfig::default()
    };

    let p = pipeline(&env, cfg);
    assert_eq!(p.run(&r1).await.unwrap().ingested, 1);
    assert_eq!(p.run(&r2).await.unwrap().ingested, 1);

    assert_eq!(env.meta.count_documents().await.unwrap(), 2);
    let a = id_of(&r1, "notes.md");
    let b = id_of(&r2, "notes.md");
    assert_ne!(a, b);
    let set = env
        .meta
        .find_documents(&MetadataQuery::parse("asbestos"))
        .await
        .unwrap();
    assert!(set.contains(&a));
    assert_eq!(env.backend.chunk_indices(&a), vec![0]);
    assert_eq!(env.backend.chunk_indices(&b), vec![0]);
}

/// Accepts the collection but refuses every chunk write.
struct RejectingBackend;

impl VectorBackend for RejectingBackend {
    fn ensure_ready<'a>(&'a self, _space: &'a VectorSpace) -> BoxFuture<'a, Result<(), RagError>> {
        Box::pin(async { Ok(()) })
    }

    fn replace_chunks<'a>(
        &'a self,
        _doc_id: &'a DocumentId,
        _chunks: Vec<ChunkRecord>,
    ) -> BoxFuture<'a, Result<usize, RagError>> {
        Box::pin(async { Err(RagError::Backend("disk full".into())) })
    }

    fn search<'a>(
        &'a self,
        _vector: Vec<f32>,
        _candidates: &'a CandidateIdSet,
        _top_k: u64,
    ) -> BoxFuture<'a, Result<Vec<ScoredCandidate>, RagError>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn name(&self) -> &'static str {
        "rejecting"
    }
}

#[tokio::test]
async fn failed_vector_write_leaves_no_metadata_row() {
    let env = env();
    let root = env.dir.path();
    write(root, "lease.md", b"Lease terms.");
    let cfg = IngestConfig {
        cluster: false,
        ..IngestConfig::default()
    };

    // A row from an earlier successful run must not survive a failed rewrite either.
    pipeline(&env, cfg.clone()).run(root).await.unwrap();
    assert_eq!(env.meta.count_documents().await.unwrap(), 1);

    let rejecting = RagStore::with_backend(
        RagConfig::in_memory(DIM),
        Arc::new(RejectingBackend),
        Arc::new(HashingEmbedder::new(DIM)),
    )
    .unwrap();
    let report = IngestionPipeline::new(cfg, env.meta.clone(), rejecting)
        .unwrap()
        .run(root)
        .await
        .unwrap();

    assert_eq!(report.ingested, 0);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "lease.md");
    assert_eq!(env.meta.count_documents().await.unwrap(), 0);
    let set = env
        .meta
        .find_documents(&MetadataQuery::parse("lease"))
        .await
        .unwrap();
    assert!(set.is_empty());
}

#[tokio::test]
async fn missing_root_is_an_error() {
    let env = env();
    let missing = env.dir.path().join("nope");
    assert!(pipeline(&env, IngestConfig::default()).run(&missing).await.is_err());
}

#[test]
fn invalid_config_is_rejected() {
    let env = env();
    let cfg = IngestConfig {
        chunk_overlap: 5000,
        ..IngestConfig::default()
    };
    assert!(IngestionPipeline::new(cfg, env.meta.clone(), env.vectors.clone()).is_err());
}
