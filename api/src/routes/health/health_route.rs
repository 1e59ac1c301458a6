//! GET /health: liveness of the stores and the model endpoints.

use std::sync::Arc;

use ai_llm_service::health_service::HealthStatus;
use axum::{extract::State, http::StatusCode, response::Response};
use serde::Serialize;

use crate::core::{app_state::AppState, http::response_envelope::ApiResponse};

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub ok: bool,
    pub documents: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_error: Option<String>,
    pub vector_backend: &'static str,
    pub models: Vec<HealthStatus>,
}

/// Always answers 200 when the report could be built; `ok` carries the verdict.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let (documents, metadata_error) = match state.metadata.count_documents().await {
        Ok(n) => (Some(n), None),
        Err(e) => (None, Some(e.to_string())),
    };
    let models = match &state.llm {
        Some(llm) => llm.health_all().await,
        None => Vec::new(),
    };
    let ok = metadata_error.is_none() && models.iter().all(|m| m.ok);

    ApiResponse::success(HealthReport {
        ok,
        documents,
        metadata_error,
        vector_backend: state.orchestrator.vectors().backend_name(),
        models,
    })
    .into_response_with_status(StatusCode::OK)
}
