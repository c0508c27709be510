use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use reportqa_cli::server::{router, NO_QUESTION};
use reportqa_core::config::Settings;
use reportqa_core::report::{Report, StaticReport};
use reportqa_core::traits::GenerationClient;
use reportqa_core::GenerationError;
use reportqa_embed::HashEmbedder;
use reportqa_qa::{QaService, INIT_FAILED_ANSWER};

struct EchoGenerator;

impl GenerationClient for EchoGenerator {
    fn model_id(&self) -> &str { "echo" }
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let question = prompt.lines().find_map(|l| l.strip_prefix("Question: ")).unwrap_or_default();
        Ok(format!("answer to: {question}"))
    }
}

struct UnavailableGenerator;

impl GenerationClient for UnavailableGenerator {
    fn model_id(&self) -> &str { "unavailable" }
    fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Transient("connection refused".into()))
    }
}

fn service(generator: Arc<dyn GenerationClient>, report: Report) -> Arc<QaService> {
    let mut service = QaService::new(Arc::new(HashEmbedder::default()), generator, &Settings::default()).unwrap();
    let _ = service.initialize(&StaticReport(report));
    Arc::new(service)
}

fn hotel_report() -> Report {
    Report::from_value(json!({
        "overall_insights": {"total_bookings": 119390, "cancellation_rate": 37.04},
        "hotel_insights": {"bookings_by_hotel": {"City Hotel": 79330, "Resort Hotel": 40060}}
    }))
    .unwrap()
}

fn post_ask(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/ask")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(service: Arc<QaService>, request: Request<Body>) -> (StatusCode, Value) {
    let response = router(service).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1_000_000).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn ask_returns_answer() {
    let (status, body) = send(service(Arc::new(EchoGenerator), hotel_report()), post_ask(r#"{"question": "What is the cancellation rate?"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "answer": "answer to: What is the cancellation rate?" }));
}

#[tokio::test]
async fn missing_question_is_bad_request() {
    for bad in [r#"{}"#, r#"{"q": "x"}"#, r#"{"question": 42}"#, "not json"] {
        let (status, body) = send(service(Arc::new(EchoGenerator), hotel_report()), post_ask(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{bad}");
        assert_eq!(body, json!({ "error": NO_QUESTION }));
    }
}

#[tokio::test]
async fn missing_content_type_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/ask")
        .body(Body::from(r#"{"question": "x"}"#))
        .unwrap();
    let (status, _) = send(service(Arc::new(EchoGenerator), hotel_report()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn backend_failure_is_still_an_answer() {
    let (status, body) = send(service(Arc::new(UnavailableGenerator), hotel_report()), post_ask(r#"{"question": "q"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    let answer = body["answer"].as_str().unwrap();
    assert!(answer.starts_with("Error during query: "), "{answer}");
    assert!(answer.contains("connection refused"));
}

#[tokio::test]
async fn failed_service_answers_with_sentinel() {
    let failed = service(Arc::new(EchoGenerator), Report::new());
    let (status, body) = send(failed.clone(), post_ask(r#"{"question": "q"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], INIT_FAILED_ANSWER);

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(failed, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "ready": false }));
}

#[tokio::test]
async fn health_reports_ready() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(service(Arc::new(EchoGenerator), hotel_report()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}
