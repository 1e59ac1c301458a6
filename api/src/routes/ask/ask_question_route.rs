//! POST /ask: one orchestrated turn.

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, extract::State, extract::rejection::JsonRejection, http::StatusCode, response::Response};
use contextor::{AgentBackend, TurnAnswer};
use tracing::debug;

use crate::{
    core::{app_state::AppState, http::response_envelope::ApiResponse},
    error_handler::{AppError, AppResult},
    routes::ask::ask_request::{AskRequest, AskResponse},
};

/// Handler: POST /ask
///
/// # Example
/// ```bash
/// curl -X POST http://127.0.0.1:8080/ask \
///   -H 'content-type: application/json' \
///   -d '{"question":"3 most recent jurisdiction:contract-law rulings","timeout_secs":60}'
/// ```
pub async fn ask_question(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(body) = body?;
    let question = body.question.trim();
    if question.is_empty() {
        return Err(AppError::BadRequest("question must not be empty".into()));
    }

    let answer: TurnAnswer = match body.timeout_secs {
        Some(0) => return Err(AppError::BadRequest("timeout_secs must be > 0".into())),
        Some(secs) => {
            let deadline = Duration::from_secs(secs).min(state.max_turn_timeout);
            state
                .orchestrator
                .respond_with_timeout(question, deadline)
                .await?
        }
        None => state.orchestrator.respond(question).await?,
    };
    debug!(outcome = ?answer.outcome, "ask: done");

    let TurnAnswer {
        answer,
        outcome,
        context,
        trace,
        degraded_rerank,
    } = answer;
    Ok(ApiResponse::success(AskResponse {
        answer,
        outcome,
        context,
        trace,
        degraded_rerank,
    })
    .into_response_with_status(StatusCode::OK))
}
