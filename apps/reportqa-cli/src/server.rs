//! HTTP boundary: `POST /ask` and `GET /health`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::error;

use reportqa_qa::QaService;

pub const NO_QUESTION: &str = "No question provided";

pub fn router(service: Arc<QaService>) -> Router {
    Router::new()
        .route("/ask", post(ask))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// `{"question": "..."}` → `{"answer": "..."}`.
///
/// The service never fails a question, so the only error statuses are a
/// missing question (400) and a worker that did not complete (500).
async fn ask(State(service): State<Arc<QaService>>, payload: Result<Json<Value>, JsonRejection>) -> Response {
    let question = payload
        .ok()
        .and_then(|Json(body)| body.get("question").and_then(Value::as_str).map(str::to_owned));
    let Some(question) = question else {
        return error_response(StatusCode::BAD_REQUEST, NO_QUESTION);
    };

    // Embedding and generation block; keep them off the async workers.
    match tokio::task::spawn_blocking(move || service.ask(&question)).await {
        Ok(answer) => Json(json!({ "answer": answer })).into_response(),
        Err(e) => {
            error!(error = %e, "ask worker did not complete");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn health(State(service): State<Arc<QaService>>) -> Json<Value> {
    Json(json!({ "status": "ok", "ready": service.is_ready() }))
}
