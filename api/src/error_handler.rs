use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use contextor::TurnError;
use ingestion::IngestError;
use metadata_store::MetadataError;
use thiserror::Error;
use tracing::error;

use crate::core::http::response_envelope::ApiResponse;

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // --- IO / network / server ---
    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request / routing ---
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error("feature disabled: {0}")]
    Disabled(&'static str),

    // --- Pipeline ---
    #[error(transparent)]
    Turn(#[from] TurnError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Disabled(_) => StatusCode::SERVICE_UNAVAILABLE,

            AppError::Turn(TurnError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Turn(TurnError::BackingStore { .. }) => StatusCode::BAD_GATEWAY,
            AppError::Turn(TurnError::Synthesis(_)) => StatusCode::BAD_GATEWAY,
            AppError::Turn(TurnError::Configuration(_)) => StatusCode::INTERNAL_SERVER_ERROR,

            AppError::Metadata(MetadataError::Backend(_)) => StatusCode::BAD_GATEWAY,
            AppError::Metadata(MetadataError::Config(_)) => StatusCode::INTERNAL_SERVER_ERROR,

            AppError::Ingest(IngestError::Io { .. }) => StatusCode::BAD_REQUEST,
            AppError::Ingest(IngestError::Config(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Ingest(_) => StatusCode::BAD_GATEWAY,

            AppError::Bind(_) | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Bind(_) => "BIND_ERROR",
            AppError::Server(_) => "SERVER_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound => "NOT_FOUND",
            AppError::Disabled(_) => "DISABLED",
            AppError::Turn(TurnError::Timeout(_)) => "TURN_TIMEOUT",
            AppError::Turn(TurnError::BackingStore { .. }) => "BACKING_STORE_ERROR",
            AppError::Turn(TurnError::Synthesis(_)) => "SYNTHESIS_ERROR",
            AppError::Turn(TurnError::Configuration(_)) => "CONFIG_ERROR",
            AppError::Metadata(_) => "METADATA_ERROR",
            AppError::Ingest(IngestError::Io { .. }) => "INGEST_PATH_ERROR",
            AppError::Ingest(_) => "INGEST_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.error_code(), error = %self, "request failed");
        }
        ApiResponse::<()>::error(self.error_code(), self.to_string(), Vec::new())
            .into_response_with_status(status)
    }
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<axum::extract::rejection::QueryRejection> for AppError {
    fn from(err: axum::extract::rejection::QueryRejection) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
