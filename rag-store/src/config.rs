//! Runtime and collection configuration.

use serde::Deserialize;

use crate::errors::RagError;

/// Intermediate `top_k` of filtered search.
pub const DEFAULT_RETRIEVAL_WIDTH: u64 = 50;

/// Distance function used for the vector space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceKind {
    /// Cosine distance (recommended for most embeddings).
    Cosine,
    /// Dot product (useful for normalized vectors).
    Dot,
    /// Euclidean distance (L2).
    Euclid,
}

/// Which vector engine backs the index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Qdrant,
    /// In-process brute-force index; contents are lost on exit.
    Memory,
}

/// Describes the vector space of the collection.
#[derive(Clone, Debug)]
pub struct VectorSpace {
    /// Dimensionality of vectors.
    pub size: usize,
    /// Distance function.
    pub distance: DistanceKind,
}

/// Configuration for the vector index.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub backend: BackendKind,
    /// Qdrant gRPC endpoint, e.g. `http://localhost:6334`.
    pub qdrant_url: String,
    /// Optional API key for Qdrant Cloud.
    pub qdrant_api_key: Option<String>,
    /// Target collection name.
    pub collection: String,
    pub distance: DistanceKind,
    /// Upsert batch size (typical range: 128..512).
    pub upsert_batch: usize,
    /// Exact search flag (false = HNSW ANN).
    pub exact_search: bool,
    /// Pinned embedding dimension; the collection must match it.
    pub embedding_dim: usize,
    /// Default `top_k` for filtered search.
    pub retrieval_width: u64,
    /// Parallel embedding requests during ingestion.
    pub embedding_concurrency: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Qdrant,
            qdrant_url: "http://localhost:6334".into(),
            qdrant_api_key: None,
            collection: "filtered_rag_chunks".into(),
            distance: DistanceKind::Cosine,
            upsert_batch: 256,
            exact_search: false,
            embedding_dim: 768,
            retrieval_width: DEFAULT_RETRIEVAL_WIDTH,
            embedding_concurrency: 4,
        }
    }
}

impl RagConfig {
    /// Creates a default config for a given collection name and Qdrant endpoint.
    pub fn new_default(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            qdrant_url: url.into(),
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// In-memory index with the given dimension.
    pub fn in_memory(embedding_dim: usize) -> Self {
        Self {
            backend: BackendKind::Memory,
            embedding_dim,
            ..Default::default()
        }
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.backend == BackendKind::Qdrant && self.qdrant_url.trim().is_empty() {
            return Err(RagError::Config("qdrant_url is empty".into()));
        }
        if self.collection.trim().is_empty() {
            return Err(RagError::Config("collection is empty".into()));
        }
        if self.upsert_batch == 0 {
            return Err(RagError::Config("upsert_batch must be > 0".into()));
        }
        if self.embedding_dim == 0 {
            return Err(RagError::Config("embedding_dim must be > 0".into()));
        }
        if self.retrieval_width == 0 {
            return Err(RagError::Config("retrieval_width must be > 0".into()));
        }
        Ok(())
    }

    pub fn vector_space(&self) -> VectorSpace {
        VectorSpace {
            size: self.embedding_dim,
            distance: self.distance,
        }
    }
}
