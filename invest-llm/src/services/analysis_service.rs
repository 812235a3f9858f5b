//! Summaries, single-document analysis and multi-document investment insights

use super::document_service::DocumentService;
use crate::error::{LlmError, LlmResult};
use crate::prompts::{AnalysisType, InsightFocus, SummaryType, SENIOR_ANALYST_INSTRUCTIONS};
use crate::retry::with_retry;
use crate::types::{ChatMessage, Usage};
use serde::Serialize;
use tracing::debug;

/// What to summarize
#[derive(Debug, Clone)]
pub enum SummarizeInput {
    /// Inline text, summarized with a chat completion
    Text(String),
    /// Provider file id, summarized through file search
    Document(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryOutcome {
    pub summary: String,
    pub summary_type: SummaryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub model: String,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub analysis: String,
    pub analysis_type: AnalysisType,
    pub document_id: String,
    pub model: String,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightsOutcome {
    pub insights: String,
    pub analysis_focus: InsightFocus,
    pub document_ids: Vec<String>,
    pub model: String,
    pub usage: Usage,
}

#[derive(Debug, Clone)]
pub struct AnalysisService {
    documents: DocumentService,
    vector_store_id: Option<String>,
}

impl AnalysisService {
    pub fn new(documents: DocumentService, vector_store_id: Option<String>) -> Self {
        Self {
            documents,
            vector_store_id,
        }
    }

    fn vector_store(&self) -> LlmResult<&str> {
        self.vector_store_id
            .as_deref()
            .ok_or_else(|| LlmError::NotConfigured("Default vector store".to_string()))
    }

    pub async fn summarize(
        &self,
        input: SummarizeInput,
        summary_type: SummaryType,
    ) -> LlmResult<SummaryOutcome> {
        match input {
            SummarizeInput::Text(content) => {
                if content.trim().is_empty() {
                    return Err(LlmError::InvalidInput("content is empty".to_string()));
                }
                let messages = [
                    ChatMessage::system(summary_type.text_prompt()),
                    ChatMessage::user(content),
                ];
                let openai = self.documents.openai();
                let model = self.documents.model();
                let reply = with_retry("text summary", self.documents.retry_policy(), || {
                    openai.chat_completion(model, &messages, 0.3, 1000)
                })
                .await?;

                Ok(SummaryOutcome {
                    summary: reply.text,
                    summary_type,
                    document_id: None,
                    model: reply.model,
                    usage: reply.usage,
                })
            }
            SummarizeInput::Document(document_id) => {
                let vector_store_id = self.vector_store()?;
                let search = self
                    .documents
                    .search_documents(
                        summary_type.document_prompt(),
                        std::slice::from_ref(&document_id),
                        vector_store_id,
                    )
                    .await?;

                Ok(SummaryOutcome {
                    summary: search.response,
                    summary_type,
                    document_id: Some(document_id),
                    model: search.model,
                    usage: search.usage,
                })
            }
        }
    }

    pub async fn analyze_document(
        &self,
        document_id: &str,
        analysis_type: AnalysisType,
    ) -> LlmResult<AnalysisOutcome> {
        if document_id.trim().is_empty() {
            return Err(LlmError::InvalidInput("document_id is required".to_string()));
        }
        let vector_store_id = self.vector_store()?;
        debug!(document_id, analysis_type = analysis_type.as_str(), "Analyzing document");

        let document_ids = [document_id.to_string()];
        let reply = self
            .documents
            .file_search(
                vec![ChatMessage::user(analysis_type.prompt())],
                None,
                0.2,
                vector_store_id,
                &document_ids,
            )
            .await?;

        Ok(AnalysisOutcome {
            analysis: reply.text,
            analysis_type,
            document_id: document_id.to_string(),
            model: reply.model,
            usage: reply.usage,
        })
    }

    pub async fn investment_insights(
        &self,
        document_ids: &[String],
        focus: InsightFocus,
    ) -> LlmResult<InsightsOutcome> {
        if document_ids.is_empty() {
            return Err(LlmError::InvalidInput("document_ids are required".to_string()));
        }
        let vector_store_id = self.vector_store()?;
        debug!(documents = document_ids.len(), focus = focus.as_str(), "Generating investment insights");

        let reply = self
            .documents
            .file_search(
                vec![ChatMessage::user(focus.prompt())],
                Some(SENIOR_ANALYST_INSTRUCTIONS.to_string()),
                0.2,
                vector_store_id,
                document_ids,
            )
            .await?;

        Ok(InsightsOutcome {
            insights: reply.text,
            analysis_focus: focus,
            document_ids: document_ids.to_vec(),
            model: reply.model,
            usage: reply.usage,
        })
    }
}
