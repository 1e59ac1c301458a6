//! POST /ingest: ingest a directory into both stores.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    core::{app_state::AppState, http::response_envelope::ApiResponse},
    error_handler::{AppError, AppResult},
};

#[derive(Debug, Default, Deserialize)]
pub struct IngestRequest {
    /// Directory to ingest; defaults to the configured root.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// A body without a JSON content type falls back to the configured root;
/// malformed JSON is rejected with 400.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    body: Option<Json<IngestRequest>>,
) -> AppResult<Response> {
    let pipeline = state
        .ingestion
        .as_ref()
        .ok_or(AppError::Disabled("ingestion is not configured"))?;
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let root = req
        .path
        .or_else(|| state.ingest_root.clone())
        .ok_or_else(|| AppError::BadRequest("no path given and no default ingest root".into()))?;

    info!(root = %root.display(), "ingest: start");
    let report = pipeline.run(&root).await?;
    Ok(ApiResponse::success(report).into_response_with_status(StatusCode::OK))
}
