//! Handlers called directly with offline components.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use api::routes::ask::ask_question_route::ask_question;
use api::routes::ask::ask_request::AskRequest;
use api::routes::documents::documents_route::{DocumentsParams, list_documents};
use api::routes::health::health_route::health;
use api::routes::ingest::ingest_route::{IngestRequest, ingest};
use api::{AppError, AppState};
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use contextor::{Orchestrator, TurnConfig, TurnError};
use ingestion::{IngestConfig, IngestionPipeline};
use metadata_store::SqliteMetadataStore;
use rag_core::testing::{HashingEmbedder, ScriptedGenerator};
use rag_store::{InMemoryBackend, RagConfig, RagStore};
use serde_json::Value;

const DIM: usize = 16;

fn state(synth: ScriptedGenerator) -> (AppState, RagStore, Arc<SqliteMetadataStore>) {
    let meta = Arc::new(SqliteMetadataStore::open_in_memory(100).unwrap());
    let vectors = RagStore::with_backend(
        RagConfig::in_memory(DIM),
        Arc::new(InMemoryBackend::new()),
        Arc::new(HashingEmbedder::new(DIM)),
    )
    .unwrap();
    let orch = Orchestrator::new(
        TurnConfig::default(),
        meta.clone(),
        vectors.clone(),
        Arc::new(synth),
        Arc::new(ScriptedGenerator::always("6")),
    )
    .unwrap();
    (AppState::new(Arc::new(orch)), vectors, meta)
}

async fn body_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn into_response(r: Result<Response, AppError>) -> Response {
    match r {
        Ok(resp) => resp,
        Err(e) => e.into_response(),
    }
}

#[tokio::test]
async fn ask_timeout_is_504_envelope() {
    let slow = ScriptedGenerator::always("late").with_delay(Duration::from_secs(5));
    let (st, _, _) = state(slow);
    let req = AskRequest {
        question: "hello there".into(),
        timeout_secs: Some(1),
    };

    let resp = into_response(ask_question(State(Arc::new(st)), Ok(Json(req))).await);

    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    let v = body_json(resp).await;
    assert_eq!(v["success"], false);
    assert_eq!(v["error"]["code"], "TURN_TIMEOUT");
}

#[tokio::test]
async fn ask_on_empty_store_reports_no_matches() {
    let (st, _, _) = state(ScriptedGenerator::always("unused"));
    let req = AskRequest {
        question: "asbestos rulings".into(),
        timeout_secs: None,
    };

    let resp = into_response(ask_question(State(Arc::new(st)), Ok(Json(req))).await);

    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["success"], true);
    assert_eq!(v["data"]["outcome"], "no_matching_documents");
}

#[tokio::test]
async fn blank_question_is_bad_request() {
    let (st, _, _) = state(ScriptedGenerator::always("x"));
    let req = AskRequest {
        question: "   ".into(),
        timeout_secs: None,
    };
    let err = ask_question(State(Arc::new(st)), Ok(Json(req)))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ingest_then_list_documents() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("memo.md"),
        "---\njurisdiction: contract-law\ndate: 2022-01-02\n---\n# Lease memo\nTerms.",
    )
    .unwrap();

    let (st, vectors, meta) = state(ScriptedGenerator::always("x"));
    let pipeline = IngestionPipeline::new(IngestConfig::default(), meta, vectors).unwrap();
    let st = Arc::new(st.with_ingestion(Arc::new(pipeline), Some(dir.path().to_path_buf())));

    let resp = into_response(ingest(State(st.clone()), None).await);
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["data"]["ingested"], 1);

    let params = DocumentsParams {
        q: "jurisdiction:contract-law lease".into(),
    };
    let resp = into_response(list_documents(State(st.clone()), Ok(Query(params))).await);
    let v = body_json(resp).await;
    assert_eq!(v["data"]["documents"][0]["title"], "Lease memo");
    assert_eq!(v["data"]["truncated"], false);

    let explicit = IngestRequest {
        path: Some(dir.path().join("missing")),
    };
    let resp = into_response(ingest(State(st), Some(Json(explicit))).await);
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ingest_without_pipeline_is_disabled() {
    let (st, _, _) = state(ScriptedGenerator::always("x"));
    let err = ingest(State(Arc::new(st)), None).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn health_reports_store_state() {
    let (st, _, _) = state(ScriptedGenerator::always("x"));
    let v = body_json(health(State(Arc::new(st))).await).await;
    assert_eq!(v["data"]["ok"], true);
    assert_eq!(v["data"]["documents"], 0);
    assert_eq!(v["data"]["vector_backend"], "memory");
}

#[test]
fn turn_timeout_error_maps_to_504() {
    let e = AppError::from(TurnError::Timeout(Duration::from_secs(2)));
    assert_eq!(e.into_response().status(), StatusCode::GATEWAY_TIMEOUT);
}
