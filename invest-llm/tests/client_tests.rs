//! Provider client behavior against mocked OpenAI and Anthropic endpoints

use invest_llm::anthropic::AnthropicClient;
use invest_llm::openai::{OpenAiClient, ResponseRequest};
use invest_llm::types::ChatMessage;
use invest_llm::LlmError;
use serde_json::{json, Map, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn openai(server: &MockServer) -> OpenAiClient {
    OpenAiClient::new("sk-test")
        .unwrap()
        .with_base_url(server.uri())
        .with_polling(Duration::from_millis(5), 5)
}

fn vs_file(status: &str) -> Value {
    json!({
        "id": "file-abc",
        "object": "vector_store.file",
        "status": status,
        "usage_bytes": 2048,
        "attributes": {"file_id": "file-abc"},
        "last_error": null
    })
}

#[tokio::test]
async fn upload_file_posts_multipart_with_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/files"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "file-abc",
            "object": "file",
            "bytes": 4,
            "created_at": 1_700_000_000,
            "filename": "Deal_Memo_2024.pdf",
            "purpose": "assistants"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let file = openai(&server)
        .upload_file(b"%PDF".to_vec(), "Deal_Memo_2024.pdf")
        .await
        .unwrap();

    assert_eq!(file.id, "file-abc");
    assert_eq!(file.bytes, 4);
    assert_eq!(file.filename, "Deal_Memo_2024.pdf");
}

#[tokio::test]
async fn attach_polls_until_completed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/vector_stores/vs_1/files"))
        .and(header("OpenAI-Beta", "assistants=v2"))
        .and(body_partial_json(json!({"file_id": "file-abc"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(vs_file("in_progress")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vector_stores/vs_1/files/file-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vs_file("in_progress")))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vector_stores/vs_1/files/file-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vs_file("completed")))
        .mount(&server)
        .await;

    let mut attributes = Map::new();
    attributes.insert("file_id".into(), json!("file-abc"));

    let vs = openai(&server)
        .attach_file_to_vector_store("vs_1", "file-abc", &attributes)
        .await
        .unwrap();

    assert_eq!(vs.status, "completed");
    assert_eq!(vs.usage_bytes, Some(2048));
}

#[tokio::test]
async fn attach_failure_reports_last_error() {
    let server = MockServer::start().await;
    let mut failed = vs_file("failed");
    failed["last_error"] = json!({"code": "unsupported_file", "message": "File type not supported"});
    Mock::given(method("POST"))
        .and(path("/vector_stores/vs_1/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(failed))
        .mount(&server)
        .await;

    let err = openai(&server)
        .attach_file_to_vector_store("vs_1", "file-abc", &Map::new())
        .await
        .unwrap_err();

    match err {
        LlmError::VectorStore(msg) => assert!(msg.contains("unsupported_file"), "{msg}"),
        other => panic!("expected vector store error, got {other:?}"),
    }
}

#[tokio::test]
async fn attach_gives_up_after_poll_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/vector_stores/vs_1/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vs_file("in_progress")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vector_stores/vs_1/files/file-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vs_file("in_progress")))
        .mount(&server)
        .await;

    let err = openai(&server)
        .attach_file_to_vector_store("vs_1", "file-abc", &Map::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::VectorStore(_)));
}

#[tokio::test]
async fn create_response_joins_output_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "tools": [{"type": "file_search", "vector_store_ids": ["vs_1"]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_1",
            "model": "gpt-4o-2024-08-06",
            "output": [
                {"type": "file_search_call", "id": "fs_1", "status": "completed"},
                {"type": "message", "role": "assistant", "content": [
                    {"type": "output_text", "text": "Revenue grew 40%. ", "annotations": []},
                    {"type": "output_text", "text": "Margins are stable.", "annotations": []}
                ]}
            ],
            "usage": {"input_tokens": 1200, "output_tokens": 80, "total_tokens": 1280}
        })))
        .mount(&server)
        .await;

    let request = ResponseRequest::new("gpt-4o", vec![ChatMessage::user("Summarize")])
        .with_file_search("vs_1", None);
    let reply = openai(&server).create_response(&request).await.unwrap();

    assert_eq!(reply.text, "Revenue grew 40%. Margins are stable.");
    assert_eq!(reply.model, "gpt-4o-2024-08-06");
    assert_eq!(reply.usage.total_tokens, 1280);
}

#[tokio::test]
async fn response_without_text_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o",
            "output": [{"type": "file_search_call", "id": "fs_1"}]
        })))
        .mount(&server)
        .await;

    let request = ResponseRequest::new("gpt-4o", vec![ChatMessage::user("Summarize")]);
    let err = openai(&server).create_response(&request).await.unwrap_err();
    assert!(matches!(err, LlmError::Parse(_)));
}

#[tokio::test]
async fn http_status_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "unauthorized"})))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "throttled"})))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "broken"})))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let client = openai(&server);
    let messages = [ChatMessage::user("hi")];

    let err = client.chat_completion("unauthorized", &messages, 0.7, 10).await.unwrap_err();
    assert!(matches!(err, LlmError::InvalidApiKey));

    let err = client.chat_completion("throttled", &messages, 0.7, 10).await.unwrap_err();
    assert!(matches!(err, LlmError::RateLimited));
    assert!(err.is_transient());

    let err = client.chat_completion("broken", &messages, 0.7, 10).await.unwrap_err();
    match &err {
        LlmError::Api { status, body } => {
            assert_eq!(*status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("expected api error, got {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn chat_completion_reads_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"max_tokens": 2000})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Proceed to committee."}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
        })))
        .mount(&server)
        .await;

    let reply = openai(&server)
        .chat_completion("gpt-4o", &[ChatMessage::user("Next step?")], 0.7, 2000)
        .await
        .unwrap();
    assert_eq!(reply.text, "Proceed to committee.");
    assert_eq!(reply.usage.input_tokens, 12);
    assert_eq!(reply.usage.output_tokens, 4);
}

#[tokio::test]
async fn anthropic_messages_sends_version_and_system() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "ak-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-3-haiku",
            "system": "You are terse.",
            "messages": [{"role": "user", "content": "Risk?"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "model": "claude-3-haiku",
            "content": [{"type": "text", "text": "Concentration risk."}],
            "usage": {"input_tokens": 9, "output_tokens": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AnthropicClient::new("ak-test").unwrap().with_base_url(server.uri());
    let reply = client
        .messages("claude-3-haiku", Some("You are terse."), &[ChatMessage::user("Risk?")], 100)
        .await
        .unwrap();

    assert_eq!(reply.text, "Concentration risk.");
    assert_eq!(reply.usage.total_tokens, 12);
}
