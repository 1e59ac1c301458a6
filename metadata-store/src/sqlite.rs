//! SQLite-backed [`MetadataStore`].
//!
//! One connection behind a mutex; every call runs on the blocking pool so the
//! async runtime never waits on disk I/O. Writes are therefore serialized.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::{debug, info, instrument};

use rag_core::{BoxFuture, CandidateIdSet, Cluster, Document, DocumentId};

use crate::MetadataStore;
use crate::config::MetadataStoreConfig;
use crate::errors::{MetadataError, to_backend_err};
use crate::query::MetadataQuery;
use crate::schema::{self, fold};

#[derive(Clone)]
pub struct SqliteMetadataStore {
    conn: Arc<Mutex<Connection>>,
    max_results: usize,
}

impl SqliteMetadataStore {
    /// Opens (or creates) the database file and applies the schema.
    pub fn open(cfg: &MetadataStoreConfig) -> Result<Self, MetadataError> {
        cfg.validate()?;
        if let Some(parent) = cfg.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(to_backend_err)?;
        }
        let conn = Connection::open(&cfg.path).map_err(to_backend_err)?;
        info!(path = %cfg.path.display(), max_results = cfg.max_results, "metadata store opened");
        Self::init(conn, cfg.max_results)
    }

    /// Private in-memory database (tests, throwaway runs).
    pub fn open_in_memory(max_results: usize) -> Result<Self, MetadataError> {
        let conn = Connection::open_in_memory().map_err(to_backend_err)?;
        Self::init(conn, max_results)
    }

    fn init(conn: Connection, max_results: usize) -> Result<Self, MetadataError> {
        if max_results == 0 {
            return Err(MetadataError::Config("max_results must be > 0".into()));
        }
        schema::apply_pragmas(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            max_results,
        })
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, MetadataError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, MetadataError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| MetadataError::Backend("connection mutex poisoned".into()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| MetadataError::Backend(format!("blocking task failed: {e}")))?
    }

    #[instrument(skip_all, fields(terms = query.topic_terms.len()))]
    async fn find(&self, query: MetadataQuery) -> Result<CandidateIdSet, MetadataError> {
        let cap = query.effective_cap(self.max_results);
        let (sql, values) = query.to_sql(cap);
        debug!(%sql, cap, "metadata lookup");

        let ids = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(&sql).map_err(to_backend_err)?;
                let rows = stmt
                    .query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))
                    .map_err(to_backend_err)?;
                let ids = rows
                    .map(|r| r.map(DocumentId::from_raw).map_err(to_backend_err))
                    .collect::<Result<Vec<_>, _>>();
                ids
            })
            .await?;

        let set = CandidateIdSet::from_ids(ids, cap);
        info!(
            candidates = set.len(),
            cap,
            truncated = set.is_truncated(),
            "metadata lookup done"
        );
        Ok(set)
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn find_documents<'a>(
        &'a self,
        query: &'a MetadataQuery,
    ) -> BoxFuture<'a, Result<CandidateIdSet, MetadataError>> {
        Box::pin(self.find(query.clone()))
    }

    fn upsert_document<'a>(&'a self, doc: &'a Document) -> BoxFuture<'a, Result<(), MetadataError>> {
        let doc = doc.clone();
        Box::pin(self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO documents (id, title, topic, date, jurisdiction, topic_key, jurisdiction_key,
                                        source_path, cluster_id, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    topic = excluded.topic,
                    date = excluded.date,
                    jurisdiction = excluded.jurisdiction,
                    topic_key = excluded.topic_key,
                    jurisdiction_key = excluded.jurisdiction_key,
                    source_path = excluded.source_path,
                    cluster_id = excluded.cluster_id,
                    updated_at = excluded.updated_at",
                params![
                    doc.id.as_str(),
                    doc.title,
                    doc.topic,
                    doc.date.format("%Y-%m-%d").to_string(),
                    doc.jurisdiction,
                    fold(&doc.topic),
                    fold(&doc.jurisdiction),
                    doc.source_path,
                    doc.cluster_id,
                ],
            )
            .map_err(to_backend_err)?;
            Ok(())
        }))
    }

    fn replace_clusters<'a>(
        &'a self,
        clusters: Vec<Cluster>,
        assignments: Vec<(DocumentId, i64)>,
    ) -> BoxFuture<'a, Result<(), MetadataError>> {
        Box::pin(self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(to_backend_err)?;
            tx.execute("UPDATE documents SET cluster_id = NULL", [])
                .map_err(to_backend_err)?;
            tx.execute("DELETE FROM clusters", []).map_err(to_backend_err)?;
            {
                let mut insert = tx
                    .prepare(
                        "INSERT INTO clusters (id, name, name_key, member_count, updated_at)
                         VALUES (?1, ?2, ?3, ?4, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
                    )
                    .map_err(to_backend_err)?;
                for c in &clusters {
                    insert
                        .execute(params![c.id, c.name, fold(&c.name), c.member_count as i64])
                        .map_err(to_backend_err)?;
                }
                let mut assign = tx
                    .prepare("UPDATE documents SET cluster_id = ?2 WHERE id = ?1")
                    .map_err(to_backend_err)?;
                for (doc, cluster) in &assignments {
                    assign
                        .execute(params![doc.as_str(), cluster])
                        .map_err(to_backend_err)?;
                }
            }
            tx.commit().map_err(to_backend_err)?;
            debug!(clusters = clusters.len(), assigned = assignments.len(), "clusters replaced");
            Ok(())
        }))
    }

    fn delete_document<'a>(
        &'a self,
        doc_id: &'a DocumentId,
    ) -> BoxFuture<'a, Result<(), MetadataError>> {
        let id = doc_id.as_str().to_string();
        Box::pin(self.with_conn(move |conn| {
            let n = conn
                .execute("DELETE FROM documents WHERE id = ?1", params![id])
                .map_err(to_backend_err)?;
            debug!(doc = %id, deleted = n, "document row removed");
            Ok(())
        }))
    }

    fn get_document<'a>(
        &'a self,
        doc_id: &'a DocumentId,
    ) -> BoxFuture<'a, Result<Option<Document>, MetadataError>> {
        let id = doc_id.as_str().to_string();
        Box::pin(self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, title, topic, date, jurisdiction, source_path, cluster_id
                     FROM documents WHERE id = ?1",
                    params![id],
                    |r| {
                        Ok((
                            r.get::<_, String>(0)?,
                            r.get::<_, String>(1)?,
                            r.get::<_, String>(2)?,
                            r.get::<_, String>(3)?,
                            r.get::<_, String>(4)?,
                            r.get::<_, String>(5)?,
                            r.get::<_, Option<i64>>(6)?,
                        ))
                    },
                )
                .optional()
                .map_err(to_backend_err)?;

            row.map(|(id, title, topic, date, jurisdiction, source_path, cluster_id)| {
                let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
                    MetadataError::Backend(format!("corrupt date '{date}' for {id}: {e}"))
                })?;
                Ok(Document {
                    id: DocumentId::from_raw(id),
                    title,
                    topic,
                    date,
                    jurisdiction,
                    source_path,
                    cluster_id,
                })
            })
            .transpose()
        }))
    }

    fn count_documents(&self) -> BoxFuture<'_, Result<usize, MetadataError>> {
        Box::pin(self.with_conn(|conn| {
            let n: i64 = conn
                .query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))
                .map_err(to_backend_err)?;
            Ok(n as usize)
        }))
    }

    fn list_clusters(&self) -> BoxFuture<'_, Result<Vec<Cluster>, MetadataError>> {
        Box::pin(self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, member_count FROM clusters ORDER BY id")
                .map_err(to_backend_err)?;
            let rows = stmt
                .query_map([], |r| {
                    Ok(Cluster {
                        id: r.get(0)?,
                        name: r.get(1)?,
                        member_count: r.get::<_, i64>(2)? as usize,
                    })
                })
                .map_err(to_backend_err)?;
            let clusters = rows
                .map(|r| r.map_err(to_backend_err))
                .collect::<Result<Vec<_>, _>>();
            clusters
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str, topic: &str, date: &str, jurisdiction: &str) -> Document {
        Document {
            id: DocumentId::from_canonical(path),
            title: path.to_string(),
            topic: topic.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            jurisdiction: jurisdiction.to_string(),
            source_path: path.to_string(),
            cluster_id: None,
        }
    }

    async fn seeded() -> SqliteMetadataStore {
        let store = SqliteMetadataStore::open_in_memory(100).unwrap();
        for d in [
            doc("a.md", "Asbestos litigation", "2021-03-01", "legal"),
            doc("b.md", "Contract law basics", "2022-05-10", "legal"),
            doc("c.md", "Sourdough baking", "2023-01-15", "personal"),
            doc("d.md", "Asbestos removal guide", "2019-07-04", "technical"),
        ] {
            store.upsert_document(&d).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn topic_terms_match_any() {
        let store = seeded().await;
        let set = store
            .find_documents(&MetadataQuery::parse("asbestos"))
            .await
            .unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&DocumentId::from_canonical("a.md")));
        assert!(set.contains(&DocumentId::from_canonical("d.md")));
    }

    #[tokio::test]
    async fn structured_criteria_are_conjunctive() {
        let store = seeded().await;
        let q = MetadataQuery::parse("asbestos jurisdiction:legal after:2020-01-01");
        let set = store.find_documents(&q).await.unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains(&DocumentId::from_canonical("a.md")));
    }

    #[tokio::test]
    async fn recency_limit_keeps_newest() {
        let store = seeded().await;
        let q = MetadataQuery {
            limit: Some(2),
            newest_first: true,
            ..Default::default()
        };
        let set = store.find_documents(&q).await.unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.is_truncated());
        assert!(set.contains(&DocumentId::from_canonical("c.md")));
        assert!(set.contains(&DocumentId::from_canonical("b.md")));
    }

    #[tokio::test]
    async fn no_match_is_empty_not_error() {
        let store = seeded().await;
        let set = store
            .find_documents(&MetadataQuery::parse("volcano"))
            .await
            .unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn upsert_replaces_in_place() {
        let store = seeded().await;
        let mut d = doc("a.md", "Asbestos appeal", "2024-01-01", "legal");
        d.title = "Appeal".into();
        store.upsert_document(&d).await.unwrap();
        assert_eq!(store.count_documents().await.unwrap(), 4);
        let got = store.get_document(&d.id).await.unwrap().unwrap();
        assert_eq!(got.topic, "Asbestos appeal");
        assert_eq!(got.title, "Appeal");
    }

    #[tokio::test]
    async fn delete_removes_row_from_lookups() {
        let store = seeded().await;
        let a = DocumentId::from_canonical("a.md");
        store.delete_document(&a).await.unwrap();
        store.delete_document(&a).await.unwrap();
        assert_eq!(store.count_documents().await.unwrap(), 3);
        let set = store.find_documents(&MetadataQuery::parse("asbestos")).await.unwrap();
        assert!(!set.contains(&a));
    }

    #[tokio::test]
    async fn clusters_are_replaced_wholesale() {
        let store = seeded().await;
        let a = DocumentId::from_canonical("a.md");
        let b = DocumentId::from_canonical("b.md");
        store
            .replace_clusters(
                vec![
                    Cluster { id: 0, name: "old".into(), member_count: 1 },
                    Cluster { id: 1, name: "stale".into(), member_count: 1 },
                ],
                vec![(a.clone(), 0), (b.clone(), 1)],
            )
            .await
            .unwrap();
        store
            .replace_clusters(
                vec![Cluster { id: 0, name: "legal_matters".into(), member_count: 2 }],
                vec![(a.clone(), 0), (b.clone(), 0)],
            )
            .await
            .unwrap();

        let clusters = store.list_clusters().await.unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].name, "legal_matters");

        let set = store
            .find_documents(&MetadataQuery::parse("cluster:legal_matters"))
            .await
            .unwrap();
        assert_eq!(set.len(), 2);
    }

    #[tokio::test]
    async fn reupsert_takes_new_cluster_value() {
        let store = seeded().await;
        let a = DocumentId::from_canonical("a.md");
        store
            .replace_clusters(
                vec![Cluster { id: 0, name: "legal".into(), member_count: 1 }],
                vec![(a.clone(), 0)],
            )
            .await
            .unwrap();
        assert_eq!(store.get_document(&a).await.unwrap().unwrap().cluster_id, Some(0));

        // Second ingestion without clustering.
        store
            .upsert_document(&doc("a.md", "Asbestos litigation", "2021-03-01", "legal"))
            .await
            .unwrap();
        assert_eq!(store.get_document(&a).await.unwrap().unwrap().cluster_id, None);
    }

    #[tokio::test]
    async fn non_ascii_case_is_folded() {
        let store = seeded().await;
        let e = doc("e.md", "Ärzte Haftung", "2022-02-02", "Öffentliches-Recht");
        store.upsert_document(&e).await.unwrap();
        store
            .replace_clusters(
                vec![Cluster { id: 0, name: "Medizin_Ärzte".into(), member_count: 1 }],
                vec![(e.id.clone(), 0)],
            )
            .await
            .unwrap();

        for q in ["ärzte", "ÄRZTE", "jurisdiction:öffentliches-recht", "cluster:medizin_ärzte"] {
            let set = store.find_documents(&MetadataQuery::parse(q)).await.unwrap();
            assert!(set.contains(&e.id), "{q} should match");
            assert_eq!(set.len(), 1, "{q}");
        }
    }

    fn open_at(path: &std::path::Path) -> SqliteMetadataStore {
        SqliteMetadataStore::open(&MetadataStoreConfig {
            path: path.to_path_buf(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/meta.sqlite");
        {
            let store = open_at(&path);
            store
                .upsert_document(&doc("x.md", "Persisted", "2020-01-01", "personal"))
                .await
                .unwrap();
        }
        let store = open_at(&path);
        assert_eq!(store.count_documents().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn backend_failure_is_an_error() {
        let store = seeded().await;
        store
            .with_conn(|conn| conn.execute_batch("DROP TABLE documents").map_err(to_backend_err))
            .await
            .unwrap();
        let err = store
            .find_documents(&MetadataQuery::parse("asbestos"))
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::Backend(_)));
    }
}
