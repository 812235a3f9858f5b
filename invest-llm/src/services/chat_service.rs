//! Chat completions (OpenAI or Anthropic) and document question answering

use crate::anthropic::{split_system, AnthropicClient};
use crate::error::{LlmError, LlmResult};
use crate::filters::FileFilter;
use crate::openai::{OpenAiClient, ResponseRequest};
use crate::prompts::qa_instructions;
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{ChatMessage, Usage};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub response: String,
    pub model: String,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize)]
pub struct QaOutcome {
    pub answer: String,
    pub question: String,
    pub model: String,
    pub usage: Usage,
    pub document_ids: Vec<String>,
    pub vector_store_id: String,
}

#[derive(Debug, Clone)]
pub struct ChatService {
    openai: OpenAiClient,
    anthropic: Option<AnthropicClient>,
    default_model: String,
    retry: RetryPolicy,
}

/// Models routed to Anthropic
pub fn is_anthropic_model(model: &str) -> bool {
    model.starts_with("claude")
}

impl ChatService {
    pub fn new(
        openai: OpenAiClient,
        anthropic: Option<AnthropicClient>,
        default_model: &str,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            openai,
            anthropic,
            default_model: default_model.to_string(),
            retry,
        }
    }

    pub fn anthropic_configured(&self) -> bool {
        self.anthropic.is_some()
    }

    /// Chat completion; `claude*` models go to Anthropic, everything else to OpenAI
    pub async fn completion(&self, messages: &[ChatMessage], model: Option<&str>) -> LlmResult<ChatOutcome> {
        if messages.is_empty() {
            return Err(LlmError::InvalidInput("messages are required".to_string()));
        }
        let model = model.unwrap_or(&self.default_model);

        let reply = if is_anthropic_model(model) {
            let anthropic = self
                .anthropic
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("Anthropic".to_string()))?;
            let (system, turns) = split_system(messages);
            with_retry("anthropic completion", &self.retry, || {
                anthropic.messages(model, system.as_deref(), &turns, 2000)
            })
            .await?
        } else {
            with_retry("openai completion", &self.retry, || {
                self.openai.chat_completion(model, messages, 0.7, 2000)
            })
            .await?
        };

        Ok(ChatOutcome {
            response: reply.text,
            model: reply.model,
            usage: reply.usage,
        })
    }

    /// Answer a question from documents, continuing an optional conversation
    pub async fn document_qa(
        &self,
        question: &str,
        document_ids: &[String],
        vector_store_id: &str,
        history: Vec<ChatMessage>,
    ) -> LlmResult<QaOutcome> {
        if question.trim().is_empty() {
            return Err(LlmError::InvalidInput("question is required".to_string()));
        }

        let mut input = history;
        input.push(ChatMessage::user(question));

        let request = ResponseRequest::new(self.default_model.clone(), input)
            .with_instructions(qa_instructions(question))
            .with_temperature(0.1)
            .with_file_search(vector_store_id, FileFilter::for_documents(document_ids));

        let reply = with_retry("document qa", &self.retry, || self.openai.create_response(&request)).await?;

        Ok(QaOutcome {
            answer: reply.text,
            question: question.to_string(),
            model: reply.model,
            usage: reply.usage,
            document_ids: document_ids.to_vec(),
            vector_store_id: vector_store_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_routing() {
        assert!(is_anthropic_model("claude-3-sonnet-20240229"));
        assert!(!is_anthropic_model("gpt-4o"));
    }

    #[tokio::test]
    async fn test_claude_without_anthropic_is_not_configured() {
        let openai = OpenAiClient::new("sk-test").unwrap();
        let service = ChatService::new(openai, None, "gpt-4o", RetryPolicy::none());

        let err = service
            .completion(&[ChatMessage::user("hi")], Some("claude-3-haiku"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_empty_messages_rejected() {
        let openai = OpenAiClient::new("sk-test").unwrap();
        let service = ChatService::new(openai, None, "gpt-4o", RetryPolicy::none());

        let err = service.completion(&[], None).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidInput(_)));
    }
}
