//! HTTP API over the filtered retrieval pipeline.
//!
//! Routes:
//! - `POST /ask`        one orchestrated turn
//! - `GET  /documents`  metadata lookup (`?q=` uses the filter syntax)
//! - `POST /ingest`     ingest a directory
//! - `GET  /health`     store and model liveness

pub mod core;
pub mod error_handler;
mod middleware_layer;
pub mod routes;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tokio::signal;
use tracing::{error, info};

pub use crate::core::app_state::AppState;
pub use crate::error_handler::{AppError, AppResult};

use crate::middleware_layer::json_extractor::json_error_mapper;
use crate::routes::{
    ask::ask_question_route::ask_question, documents::documents_route::list_documents,
    health::health_route::health, ingest::ingest_route::ingest,
};

/// Builds the router with all routes and the JSON rejection mapper.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ask", post(ask_question))
        .route("/documents", get(list_documents))
        .route("/ingest", post(ingest))
        .route("/health", get(health))
        .layer(middleware::from_fn(json_error_mapper))
        .with_state(state)
}

/// Serves on `address` until Ctrl+C.
pub async fn start(state: AppState, address: &str) -> Result<(), AppError> {
    let app = router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(AppError::Bind)?;
    info!(%address, "api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
