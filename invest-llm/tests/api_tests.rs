//! Router-level tests: authentication, validation and response envelopes

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_body_util::BodyExt;
use invest_llm::openai::OpenAiClient;
use invest_llm::retry::RetryPolicy;
use invest_llm::{build_router, AppState, LlmServices, LlmSettings};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SERVICE_KEY: &str = "llm-test-key";

fn app(server: &MockServer) -> axum::Router {
    let mut settings = LlmSettings::new("sk-test");
    settings.default_vector_store_id = Some("vs_default".to_string());
    settings.retry = RetryPolicy::none();

    let openai = OpenAiClient::new("sk-test")
        .unwrap()
        .with_base_url(server.uri())
        .with_polling(Duration::from_millis(5), 3);
    let services = LlmServices::with_clients(&settings, openai, None);

    build_router(AppState::new(services, SERVICE_KEY.to_string()))
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", SERVICE_KEY))
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_and_info_need_no_key() {
    let server = MockServer::start().await;

    let response = app(&server)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "invest-llm");
    assert_eq!(body["anthropic_configured"], false);
    assert_eq!(body["default_vector_store"], "vs_default");

    let response = app(&server)
        .oneshot(Request::builder().uri("/info").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["supported_models"]["anthropic"], json!([]));
}

#[tokio::test]
async fn missing_key_is_rejected() {
    let server = MockServer::start().await;
    let request = Request::builder()
        .method("POST")
        .uri("/chat/completion")
        .header("content-type", "application/json")
        .body(Body::from(json!({"messages": [{"role": "user", "content": "hi"}]}).to_string()))
        .unwrap();

    let response = app(&server).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "API key required");
}

#[tokio::test]
async fn wrong_key_is_rejected() {
    let server = MockServer::start().await;
    let request = Request::builder()
        .method("POST")
        .uri("/documents/search")
        .header("content-type", "application/json")
        .header("x-api-key", "llm-wrong")
        .body(Body::from(json!({"query": "revenue"}).to_string()))
        .unwrap();

    let response = app(&server).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Invalid API key");
}

#[tokio::test]
async fn query_parameter_key_is_accepted() {
    let server = MockServer::start().await;
    let request = Request::builder()
        .method("POST")
        .uri(format!("/documents/search?api_key={}", SERVICE_KEY))
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();

    // Authenticated, then rejected for the missing query
    let response = app(&server).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "query is required");
}

#[tokio::test]
async fn missing_required_fields_return_400() {
    let server = MockServer::start().await;
    let cases = [
        ("/documents/upload-and-vectorize", "Either file_path or file_content is required"),
        ("/documents/analyze", "document_id is required"),
        ("/chat/completion", "messages are required"),
        ("/chat/document-qa", "question is required"),
        ("/analysis/summarize", "content or document_id is required"),
        ("/analysis/investment-insights", "document_ids are required"),
    ];

    for (uri, message) in cases {
        let response = app(&server).oneshot(post(uri, json!({}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], message, "{uri}");
    }
}

#[tokio::test]
async fn base64_upload_without_filename_is_400() {
    let server = MockServer::start().await;
    let response = app(&server)
        .oneshot(post(
            "/documents/upload-and-vectorize",
            json!({"file_content": STANDARD.encode(b"%PDF")}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_completion_success_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o",
            "choices": [{"message": {"role": "assistant", "content": "Looks sound."}}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
        })))
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post(
            "/chat/completion",
            json!({"messages": [{"role": "user", "content": "Is this deal sound?"}]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["response"], "Looks sound.");
    assert_eq!(body["usage"]["total_tokens"], 7);
}

#[tokio::test]
async fn claude_without_anthropic_is_503() {
    let server = MockServer::start().await;
    let response = app(&server)
        .oneshot(post(
            "/chat/completion",
            json!({"model": "claude-3-haiku", "messages": [{"role": "user", "content": "hi"}]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["error"], "Anthropic not configured");
}

#[tokio::test]
async fn provider_failure_is_502() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post("/documents/search", json!({"query": "revenue"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn base64_upload_vectorizes_with_merged_attributes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "file-xyz",
            "bytes": 4,
            "created_at": 1_700_000_000,
            "filename": "Acme_Corp_Annual_Report_2023.pdf"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/vector_stores/vs_default/files"))
        .and(body_partial_json(json!({
            "file_id": "file-xyz",
            "attributes": {"file_id": "file-xyz", "year": "2023", "team": "growth"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "file-xyz",
            "status": "completed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post(
            "/documents/upload-and-vectorize",
            json!({
                "file_content": STANDARD.encode(b"%PDF"),
                "filename": "Acme_Corp_Annual_Report_2023.pdf",
                "attributes": {"team": "growth"}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["file"]["id"], "file-xyz");
    assert_eq!(body["applied_attributes"]["company"], "Acme");
    assert_eq!(body["applied_attributes"]["file_size_bytes"], "4");
}

#[tokio::test]
async fn document_qa_prepends_conversation_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(body_partial_json(json!({
            "input": [
                {"role": "user", "content": "What is the ask?"},
                {"role": "assistant", "content": "$2M seed."},
                {"role": "user", "content": "At what valuation?"}
            ],
            "temperature": 0.1
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o",
            "output": [{"type": "message", "content": [{"type": "output_text", "text": "$10M pre-money."}]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&server)
        .oneshot(post(
            "/chat/document-qa",
            json!({
                "question": "At what valuation?",
                "document_ids": ["file-1"],
                "context": {"conversation_history": [
                    {"role": "user", "content": "What is the ask?"},
                    {"role": "assistant", "content": "$2M seed."}
                ]}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["answer"], "$10M pre-money.");
    assert_eq!(body["vector_store_id"], "vs_default");
}
