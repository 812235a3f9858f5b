//! OpenAI HTTP client
//!
//! Covers the four endpoint families the services need:
//! - Files (`POST /files`)
//! - Vector store files (create, then poll until processed)
//! - Responses API with the `file_search` tool
//! - Chat Completions

use crate::error::{LlmError, LlmResult};
use crate::filters::FileFilter;
use crate::types::{ChatMessage, ModelReply, Usage};
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Vector store processing is polled at this interval
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Give up on vector store processing after this many polls
const DEFAULT_MAX_POLLS: u32 = 120;

/// Uploaded file as returned by `POST /files`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileObject {
    pub id: String,
    pub filename: String,
    pub bytes: u64,
    /// Unix seconds
    pub created_at: i64,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreFileError {
    pub code: String,
    pub message: String,
}

/// File attached to a vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreFile {
    pub id: String,
    /// in_progress, completed, cancelled or failed
    pub status: String,
    #[serde(default)]
    pub usage_bytes: Option<u64>,
    #[serde(default)]
    pub attributes: Option<Map<String, Value>>,
    #[serde(default)]
    pub last_error: Option<VectorStoreFileError>,
}

/// Tool made available to the model in a Responses API call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tool {
    FileSearch {
        vector_store_ids: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        filters: Option<FileFilter>,
    },
}

/// Body of a Responses API call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseRequest {
    pub model: String,
    pub input: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

impl ResponseRequest {
    pub fn new(model: impl Into<String>, input: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            input,
            instructions: None,
            temperature: None,
            tools: Vec::new(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Search the given vector store, optionally restricted by `filters`
    pub fn with_file_search(mut self, vector_store_id: impl Into<String>, filters: Option<FileFilter>) -> Self {
        self.tools.push(Tool::FileSearch {
            vector_store_ids: vec![vector_store_id.into()],
            filters,
        });
        self
    }
}

#[derive(Debug, Deserialize)]
struct ResponsesApiResponse {
    model: String,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    usage: Option<ResponsesUsage>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponsesUsage {
    input_tokens: u64,
    output_tokens: u64,
    #[serde(default)]
    total_tokens: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

/// OpenAI API client
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> LlmResult<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(concat!("invest-llm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LlmError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key: api_key.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        })
    }

    /// Point the client at another OpenAI-compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override vector store polling (tests use millisecond intervals)
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.api_key)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> LlmResult<T> {
        let response = self.authorized(request).send().await?;
        let response = check_status(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| LlmError::Parse(format!("{}: {}", e, body)))
    }

    /// Upload a file for use with assistants and vector stores
    pub async fn upload_file(&self, bytes: Vec<u8>, filename: &str) -> LlmResult<FileObject> {
        debug!(filename, size = bytes.len(), "Uploading file to OpenAI");

        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);

        let file: FileObject = self
            .send_json(self.http.post(self.url("/files")).multipart(form))
            .await?;

        info!(file_id = %file.id, filename, "File uploaded to OpenAI");
        Ok(file)
    }

    /// Attach an uploaded file to a vector store without waiting for processing
    pub async fn create_vector_store_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
        attributes: &Map<String, Value>,
    ) -> LlmResult<VectorStoreFile> {
        let body = serde_json::json!({
            "file_id": file_id,
            "attributes": attributes,
        });

        self.send_json(
            self.http
                .post(self.url(&format!("/vector_stores/{}/files", vector_store_id)))
                .header("OpenAI-Beta", "assistants=v2")
                .json(&body),
        )
        .await
    }

    pub async fn retrieve_vector_store_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> LlmResult<VectorStoreFile> {
        self.send_json(
            self.http
                .get(self.url(&format!("/vector_stores/{}/files/{}", vector_store_id, file_id)))
                .header("OpenAI-Beta", "assistants=v2"),
        )
        .await
    }

    /// Attach a file to a vector store and wait until it has been processed
    ///
    /// Fails with [`LlmError::VectorStore`] if processing ends in any state
    /// other than `completed`, or is still running after the poll budget.
    pub async fn attach_file_to_vector_store(
        &self,
        vector_store_id: &str,
        file_id: &str,
        attributes: &Map<String, Value>,
    ) -> LlmResult<VectorStoreFile> {
        let mut vs_file = self
            .create_vector_store_file(vector_store_id, file_id, attributes)
            .await?;

        let mut polls = 0;
        while vs_file.status == "in_progress" {
            if polls >= self.max_polls {
                return Err(LlmError::VectorStore(format!(
                    "file {} still processing after {} polls",
                    file_id, polls
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
            polls += 1;
            vs_file = self.retrieve_vector_store_file(vector_store_id, file_id).await?;
        }

        if vs_file.status != "completed" {
            let reason = vs_file
                .last_error
                .as_ref()
                .map(|e| format!("{}: {}", e.code, e.message))
                .unwrap_or_else(|| format!("status {}", vs_file.status));
            return Err(LlmError::VectorStore(format!(
                "processing of file {} failed ({})",
                file_id, reason
            )));
        }

        info!(file_id, vector_store_id, polls, "File attached to vector store");
        Ok(vs_file)
    }

    /// Run a Responses API call and collect the output text
    pub async fn create_response(&self, request: &ResponseRequest) -> LlmResult<ModelReply> {
        let response: ResponsesApiResponse = self
            .send_json(self.http.post(self.url("/responses")).json(request))
            .await?;

        let text = response
            .output
            .iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content.iter())
            .filter(|c| c.kind == "output_text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(LlmError::Parse("response contained no output text".to_string()));
        }

        let usage = response
            .usage
            .map(|u| {
                let mut usage = Usage::new(u.input_tokens, u.output_tokens);
                if let Some(total) = u.total_tokens {
                    usage.total_tokens = total;
                }
                usage
            })
            .unwrap_or_default();

        Ok(ModelReply {
            text,
            model: response.model,
            usage,
        })
    }

    /// Plain chat completion
    pub async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> LlmResult<ModelReply> {
        let body = ChatCompletionRequest {
            model,
            messages,
            temperature,
            max_tokens,
        };

        let response: ChatCompletionResponse = self
            .send_json(self.http.post(self.url("/chat/completions")).json(&body))
            .await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("chat completion returned no choices".to_string()))?;

        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(ModelReply {
            text,
            model: response.model,
            usage,
        })
    }
}

/// Map non-success statuses onto [`LlmError`]
pub(crate) async fn check_status(response: Response) -> LlmResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status.as_u16() {
        401 => Err(LlmError::InvalidApiKey),
        429 => Err(LlmError::RateLimited),
        code => Err(LlmError::Api { status: code, body }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_request_serialization() {
        let request = ResponseRequest::new("gpt-4o", vec![ChatMessage::user("What is the IRR?")])
            .with_instructions("Be precise")
            .with_temperature(0.1)
            .with_file_search("vs_1", FileFilter::for_documents(&["file-1".to_string()]));

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-4o");
        assert_eq!(value["input"][0], json!({"role": "user", "content": "What is the IRR?"}));
        assert_eq!(value["instructions"], "Be precise");
        assert_eq!(
            value["tools"][0],
            json!({
                "type": "file_search",
                "vector_store_ids": ["vs_1"],
                "filters": {"type": "eq", "key": "file_id", "value": "file-1"}
            })
        );
    }

    #[test]
    fn test_unfiltered_search_omits_filters() {
        let request = ResponseRequest::new("gpt-4o", vec![]).with_file_search("vs_1", None);
        let value = serde_json::to_value(&request).unwrap();
        assert!(value["tools"][0].get("filters").is_none());
        assert!(value.get("instructions").is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = OpenAiClient::new("sk-test").unwrap().with_base_url("http://localhost:9/v1/");
        assert_eq!(client.base_url(), "http://localhost:9/v1");
    }
}
