//! GET /documents?q=: metadata lookup without retrieval.

use std::sync::Arc;

use axum::{
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::Response,
};
use metadata_store::MetadataQuery;
use rag_core::Document;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    core::{app_state::AppState, http::response_envelope::ApiResponse},
    error_handler::AppResult,
};

#[derive(Debug, Deserialize)]
pub struct DocumentsParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentsResponse {
    /// Criteria parsed from `q`.
    pub query: MetadataQuery,
    pub truncated: bool,
    pub documents: Vec<Document>,
}

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    params: Result<Query<DocumentsParams>, QueryRejection>,
) -> AppResult<Response> {
    let Query(params) = params?;
    let query = MetadataQuery::parse(&params.q);
    let set = state.metadata.find_documents(&query).await?;

    let mut documents = Vec::with_capacity(set.len());
    for id in set.iter() {
        match state.metadata.get_document(id).await? {
            Some(doc) => documents.push(doc),
            None => warn!(doc_id = %id, "listed id vanished before fetch"),
        }
    }
    if query.newest_first {
        documents.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
    }

    Ok(ApiResponse::success(DocumentsResponse {
        truncated: set.is_truncated(),
        query,
        documents,
    })
    .into_response_with_status(StatusCode::OK))
}
