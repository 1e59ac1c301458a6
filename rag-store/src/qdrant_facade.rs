//! Thin adapter around `qdrant-client` to isolate API usage.
//!
//! This facade concentrates all Qdrant interactions behind the
//! [`VectorBackend`] seam, hiding the builder API from the rest of the crate.

use std::collections::HashMap;

use qdrant_client::{Payload, Qdrant};
use qdrant_client::qdrant::{
    CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeletePointsBuilder, Distance,
    FieldType, Filter, PointStruct, SearchParamsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QValue, VectorParamsBuilder, vectors_config::Config as VCfg,
};
use rag_core::{BoxFuture, CandidateIdSet, DocumentId, ScoredCandidate, point_id};
use tracing::{debug, info, instrument, warn};

use crate::backend::VectorBackend;
use crate::config::{DistanceKind, RagConfig, VectorSpace};
use crate::errors::RagError;
use crate::filters::{DOC_ID_FIELD, doc_id_eq, doc_ids_in};
use crate::record::{ChunkRecord, candidate_from_payload};

/// A facade over the Qdrant client.
///
/// Holds the client, the target collection and the search knobs.
pub struct QdrantFacade {
    client: Qdrant,
    collection: String,
    upsert_batch: usize,
    exact: bool,
}

impl QdrantFacade {
    /// Creates a new facade from the given configuration.
    ///
    /// Supports optional API key authentication.
    pub fn new(cfg: &RagConfig) -> Result<Self, RagError> {
        cfg.validate()?;

        let mut builder = Qdrant::from_url(&cfg.qdrant_url);
        if let Some(key) = &cfg.qdrant_api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder.build().map_err(qdrant_err)?;

        Ok(Self {
            client,
            collection: cfg.collection.clone(),
            upsert_batch: cfg.upsert_batch.max(1),
            exact: cfg.exact_search,
        })
    }

    /// Ensures that the collection exists with the expected dimension.
    ///
    /// - Existing with matching size: no-op.
    /// - Existing with another size: `RagError::Config`.
    /// - Missing: created, plus a keyword index on `doc_id`.
    #[instrument(skip_all, fields(collection = %self.collection, size = space.size))]
    pub async fn ensure_collection(&self, space: &VectorSpace) -> Result<(), RagError> {
        if self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(qdrant_err)?
        {
            let info = self
                .client
                .collection_info(&self.collection)
                .await
                .map_err(qdrant_err)?;
            let existing = info
                .result
                .and_then(|r| r.config)
                .and_then(|c| c.params)
                .and_then(|p| p.vectors_config)
                .and_then(|v| v.config)
                .and_then(|c| match c {
                    VCfg::Params(p) => Some(p.size as usize),
                    VCfg::ParamsMap(_) => None,
                });
            return match existing {
                Some(size) if size != space.size => Err(RagError::Config(format!(
                    "collection '{}' has dimension {size}, configured {}",
                    self.collection, space.size
                ))),
                Some(_) => {
                    debug!("collection already exists");
                    Ok(())
                }
                None => {
                    warn!("collection uses named vectors; dimension not verified");
                    Ok(())
                }
            };
        }

        let distance = match space.distance {
            DistanceKind::Cosine => Distance::Cosine,
            DistanceKind::Dot => Distance::Dot,
            DistanceKind::Euclid => Distance::Euclid,
        };

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(space.size as u64, distance)),
            )
            .await
            .map_err(qdrant_err)?;

        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                &self.collection,
                DOC_ID_FIELD,
                FieldType::Keyword,
            ))
            .await
            .map_err(qdrant_err)?;

        info!("collection created with doc_id keyword index");
        Ok(())
    }

    /// Deletes every point of one document.
    pub async fn delete_document(&self, doc_id: &DocumentId) -> Result<(), RagError> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(doc_id_eq(doc_id))
                    .wait(true),
            )
            .await
            .map_err(qdrant_err)?;
        Ok(())
    }

    /// Upserts points in batches. Returns the number of points sent.
    pub async fn upsert_points(&self, points: Vec<PointStruct>) -> Result<usize, RagError> {
        if points.is_empty() {
            debug!("No points provided for upsert");
            return Ok(0);
        }

        let total = points.len();
        for batch in points.chunks(self.upsert_batch) {
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, batch.to_vec()).wait(true))
                .await
                .map_err(qdrant_err)?;
        }
        debug!(total, collection = %self.collection, "points upserted");
        Ok(total)
    }

    /// Similarity search returning `(score, payload)` tuples sorted by score.
    pub async fn search_raw(
        &self,
        vector: Vec<f32>,
        top_k: u64,
        filter: Filter,
    ) -> Result<Vec<(f32, serde_json::Value)>, RagError> {
        let mut builder = SearchPointsBuilder::new(&self.collection, vector, top_k)
            .filter(filter)
            .with_payload(true);
        if self.exact {
            builder = builder.params(SearchParamsBuilder::default().exact(true));
        }

        let res = self
            .client
            .search_points(builder)
            .await
            .map_err(qdrant_err)?;

        let out: Vec<_> = res
            .result
            .into_iter()
            .map(|r| (r.score, qpayload_to_json(r.payload)))
            .collect();
        debug!(hits = out.len(), "qdrant search completed");
        Ok(out)
    }
}

impl VectorBackend for QdrantFacade {
    fn ensure_ready<'a>(&'a self, space: &'a VectorSpace) -> BoxFuture<'a, Result<(), RagError>> {
        Box::pin(self.ensure_collection(space))
    }

    fn replace_chunks<'a>(
        &'a self,
        doc_id: &'a DocumentId,
        chunks: Vec<ChunkRecord>,
    ) -> BoxFuture<'a, Result<usize, RagError>> {
        Box::pin(async move {
            self.delete_document(doc_id).await?;
            let points = chunks.iter().map(to_point).collect();
            self.upsert_points(points).await
        })
    }

    fn search<'a>(
        &'a self,
        vector: Vec<f32>,
        candidates: &'a CandidateIdSet,
        top_k: u64,
    ) -> BoxFuture<'a, Result<Vec<ScoredCandidate>, RagError>> {
        Box::pin(async move {
            let hits = self.search_raw(vector, top_k, doc_ids_in(candidates)).await?;
            Ok(hits
                .iter()
                .filter_map(|(score, payload)| candidate_from_payload(*score, payload))
                .collect())
        })
    }

    fn name(&self) -> &'static str {
        "qdrant"
    }
}

fn to_point(rec: &ChunkRecord) -> PointStruct {
    let mut payload = Payload::new();
    payload.insert(DOC_ID_FIELD, rec.doc_id.as_str().to_string());
    payload.insert("chunk_index", i64::from(rec.chunk_index));
    payload.insert("text", rec.text.clone());
    payload.insert("source_path", rec.source_path.clone());
    PointStruct::new(
        point_id(&rec.doc_id, rec.chunk_index).to_string(),
        rec.vector.clone(),
        payload,
    )
}

fn qdrant_err(e: impl std::fmt::Display) -> RagError {
    RagError::Backend(format!("qdrant: {e}"))
}

/// Converts a Qdrant payload (`HashMap<String, qdrant::Value>`) into JSON.
///
/// Unsupported nested objects/arrays are mapped to `Null`.
fn qpayload_to_json(mut p: HashMap<String, QValue>) -> serde_json::Value {
    use qdrant_client::qdrant::value::Kind as K;
    let mut m = serde_json::Map::new();
    for (k, v) in p.drain() {
        let j = match v.kind {
            Some(K::StringValue(s)) => serde_json::Value::String(s),
            Some(K::IntegerValue(i)) => serde_json::Value::Number(i.into()),
            Some(K::DoubleValue(f)) => serde_json::json!(f),
            Some(K::BoolValue(b)) => serde_json::Value::Bool(b),
            _ => serde_json::Value::Null,
        };
        m.insert(k, j);
    }
    serde_json::Value::Object(m)
}
