//! Anthropic Messages API client

use crate::error::{LlmError, LlmResult};
use crate::openai::check_status;
use crate::types::{ChatMessage, ModelReply, Usage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [ChatMessage],
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Split OpenAI-style messages into an Anthropic system prompt and turns
///
/// The last system message wins; the others are dropped.
pub fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<ChatMessage>) {
    let mut system = None;
    let mut turns = Vec::with_capacity(messages.len());

    for message in messages {
        if message.role == "system" {
            system = Some(message.content.clone());
        } else {
            turns.push(message.clone());
        }
    }

    (system, turns)
}

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> LlmResult<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(concat!("invest-llm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LlmError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Create a message; text blocks of the reply are concatenated
    pub async fn messages(
        &self,
        model: &str,
        system: Option<&str>,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> LlmResult<ModelReply> {
        debug!(model, turns = messages.len(), "Calling Anthropic messages API");

        let body = MessagesRequest {
            model,
            system,
            messages,
            max_tokens,
        };

        let response = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body = response.text().await?;
        let parsed: MessagesResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::Parse(format!("{}: {}", e, body)))?;

        let text: String = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if text.is_empty() {
            return Err(LlmError::Parse("message contained no text blocks".to_string()));
        }

        Ok(ModelReply {
            text,
            model: parsed.model,
            usage: Usage::new(parsed.usage.input_tokens, parsed.usage.output_tokens),
        })
    }
}
