//! Metadata store adapter: structured lookup producing bounded candidate id sets.
//!
//! The store owns the `documents` and `clusters` relations. Lookups never
//! return more than `min(requested limit, max_results)` ids, and a backend
//! failure is always surfaced as [`MetadataError::Backend`].

mod config;
mod errors;
mod query;
mod schema;
mod sqlite;

pub use config::{DEFAULT_MAX_RESULTS, MetadataStoreConfig};
pub use errors::MetadataError;
pub use query::MetadataQuery;
pub use sqlite::SqliteMetadataStore;

use rag_core::{BoxFuture, CandidateIdSet, Cluster, Document, DocumentId};

/// Relational metadata operations used by ingestion and retrieval.
pub trait MetadataStore: Send + Sync {
    /// Ids of documents matching `query`, capped by the store.
    fn find_documents<'a>(
        &'a self,
        query: &'a MetadataQuery,
    ) -> BoxFuture<'a, Result<CandidateIdSet, MetadataError>>;

    /// Inserts or replaces a document row keyed by its id; every field,
    /// including `cluster_id`, takes the new value.
    fn upsert_document<'a>(&'a self, doc: &'a Document) -> BoxFuture<'a, Result<(), MetadataError>>;

    /// Deletes every cluster and writes the new set with its assignments atomically.
    fn replace_clusters<'a>(
        &'a self,
        clusters: Vec<Cluster>,
        assignments: Vec<(DocumentId, i64)>,
    ) -> BoxFuture<'a, Result<(), MetadataError>>;

    /// Removes a document row; missing ids are not an error.
    fn delete_document<'a>(
        &'a self,
        doc_id: &'a DocumentId,
    ) -> BoxFuture<'a, Result<(), MetadataError>>;

    fn get_document<'a>(
        &'a self,
        doc_id: &'a DocumentId,
    ) -> BoxFuture<'a, Result<Option<Document>, MetadataError>>;

    fn count_documents(&self) -> BoxFuture<'_, Result<usize, MetadataError>>;

    fn list_clusters(&self) -> BoxFuture<'_, Result<Vec<Cluster>, MetadataError>>;
}
