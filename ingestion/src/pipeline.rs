//! Load a directory into the metadata store and the vector index.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use metadata_store::MetadataStore;
use rag_core::text::chunk_text;
use rag_core::{Cluster, Document, DocumentId, TextGenerator};
use rag_store::embed_pool::embed_texts;
use rag_store::{ChunkRecord, RagStore};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::classify::classify;
use crate::cluster::{choose_k, kmeans, name_cluster};
use crate::config::IngestConfig;
use crate::errors::IngestError;
use crate::loader::{LoadedDocument, scan_dir};

/// Summary of one ingestion run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct IngestReport {
    pub ingested: usize,
    pub skipped: usize,
    /// `(relative path, reason)` for each file that could not be ingested.
    pub failed: Vec<(String, String)>,
    pub chunks: usize,
    pub clusters: Vec<Cluster>,
}

/// A successfully written document kept for clustering.
struct Ingested {
    id: DocumentId,
    sample: String,
    vector: Vec<f32>,
}

pub struct IngestionPipeline {
    cfg: IngestConfig,
    metadata: Arc<dyn MetadataStore>,
    vectors: RagStore,
    auxiliary: Option<Arc<dyn TextGenerator>>,
    show_progress: bool,
}

impl IngestionPipeline {
    pub fn new(
        cfg: IngestConfig,
        metadata: Arc<dyn MetadataStore>,
        vectors: RagStore,
    ) -> Result<Self, IngestError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            metadata,
            vectors,
            auxiliary: None,
            show_progress: false,
        })
    }

    /// Model used for classification and cluster naming.
    pub fn with_auxiliary(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.auxiliary = Some(generator);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Ingests every eligible file under `root`.
    ///
    /// A failing document is recorded in the report and the run continues.
    /// Clusters are recomputed from the documents written in this run.
    ///
    /// # Errors
    /// Fails only when `root` cannot be scanned or the cluster write fails.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub async fn run(&self, root: &Path) -> Result<IngestReport, IngestError> {
        let root = root.to_path_buf();
        let cfg = self.cfg.clone();
        let scan = tokio::task::spawn_blocking(move || scan_dir(&root, &cfg))
            .await
            .map_err(|e| IngestError::Config(format!("scan task failed: {e}")))??;

        let mut report = IngestReport {
            skipped: scan.skipped,
            failed: scan.failed,
            ..IngestReport::default()
        };

        let pb = self.progress_bar(scan.documents.len() as u64);
        let mut written = Vec::with_capacity(scan.documents.len());
        for doc in &scan.documents {
            pb.set_message(doc.relative_path.clone());
            match self.ingest_one(doc).await {
                Ok((ingested, chunks)) => {
                    report.ingested += 1;
                    report.chunks += chunks;
                    written.push(ingested);
                }
                Err(e) => {
                    warn!(path = %doc.relative_path, error = %e, "document failed");
                    report.failed.push((doc.relative_path.clone(), e.to_string()));
                }
            }
            pb.inc(1);
        }
        pb.finish_with_message("documents written");

        if self.cfg.cluster && !written.is_empty() {
            report.clusters = self.recluster(&written).await?;
        }

        info!(
            ingested = report.ingested,
            skipped = report.skipped,
            failed = report.failed.len(),
            chunks = report.chunks,
            clusters = report.clusters.len(),
            "ingestion done"
        );
        Ok(report)
    }

    async fn ingest_one(&self, doc: &LoadedDocument) -> Result<(Ingested, usize), IngestError> {
        let id = DocumentId::from_source_path(&doc.path);
        let texts = chunk_text(&doc.body, self.cfg.chunk_chars, self.cfg.chunk_overlap);
        let vectors = embed_texts(
            &texts,
            self.vectors.embedder().as_ref(),
            self.cfg.embed_concurrency,
        )
        .await?;

        let jurisdiction = match (&doc.jurisdiction, &self.auxiliary) {
            (Some(j), _) => j.clone(),
            (None, Some(aux)) if self.cfg.classify => {
                classify(aux.as_ref(), &doc.body).await.as_str().to_string()
            }
            _ => self.cfg.default_jurisdiction.clone(),
        };

        let mean = mean_vector(&vectors);
        let chunks: Vec<ChunkRecord> = texts
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, vector))| ChunkRecord {
                doc_id: id.clone(),
                chunk_index: i as u32,
                text,
                source_path: doc.relative_path.clone(),
                vector,
            })
            .collect();
        // Vectors before the row, so lookups never see an id without chunks.
        let n = match self.vectors.replace_document_chunks(&id, chunks).await {
            Ok(n) => n,
            Err(e) => {
                self.forget(&id).await;
                return Err(e.into());
            }
        };

        let record = Document {
            id: id.clone(),
            title: doc.title.clone(),
            topic: doc.topic.clone(),
            date: doc.date,
            jurisdiction,
            source_path: doc.relative_path.clone(),
            cluster_id: None,
        };
        self.metadata.upsert_document(&record).await?;

        Ok((
            Ingested {
                id,
                sample: doc.body.clone(),
                vector: mean,
            },
            n,
        ))
    }

    /// Drops a row left by an earlier run whose chunks could not be rewritten.
    async fn forget(&self, id: &DocumentId) {
        if let Err(e) = self.metadata.delete_document(id).await {
            warn!(doc = %id, error = %e, "could not remove metadata for failed document");
        }
    }

    async fn recluster(&self, docs: &[Ingested]) -> Result<Vec<Cluster>, IngestError> {
        let points: Vec<Vec<f32>> = docs.iter().map(|d| d.vector.clone()).collect();
        let k = choose_k(points.len(), self.cfg.clusters);
        let km = kmeans(&points, k, self.cfg.cluster_seed, self.cfg.kmeans_iterations);

        // Dense ids over non-empty groups, in centroid order.
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); k];
        for (i, &c) in km.assignments.iter().enumerate() {
            members[c].push(i);
        }
        members.retain(|m| !m.is_empty());

        let mut clusters = Vec::with_capacity(members.len());
        let mut assignments = Vec::with_capacity(docs.len());
        for (cid, group) in members.iter().enumerate() {
            let sample = &docs[group[0]].sample;
            let mut name = match &self.auxiliary {
                Some(aux) => name_cluster(aux.as_ref(), sample, cid).await,
                None => format!("cluster_{cid}"),
            };
            if clusters.iter().any(|c: &Cluster| c.name == name) {
                name = format!("{name}_{cid}");
            }
            let id = cid as i64;
            clusters.push(Cluster {
                id,
                name,
                member_count: group.len(),
            });
            assignments.extend(group.iter().map(|&i| (docs[i].id.clone(), id)));
        }

        self.metadata
            .replace_clusters(clusters.clone(), assignments)
            .await?;
        for c in &clusters {
            info!(cluster = c.id, name = %c.name, members = c.member_count, "cluster written");
        }
        Ok(clusters)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        let style = ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}/{len:3} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }
}

fn mean_vector(vectors: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let mut acc = vec![0f32; first.len()];
    for v in vectors {
        for (a, x) in acc.iter_mut().zip(v) {
            *a += x;
        }
    }
    let n = vectors.len() as f32;
    acc.iter_mut().for_each(|a| *a /= n);
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_vectors() {
        assert_eq!(mean_vector(&[vec![1.0, 3.0], vec![3.0, 5.0]]), vec![2.0, 4.0]);
        assert!(mean_vector(&[]).is_empty());
    }
}
