//! Document intelligence seam used by the approval application's job processor

use super::document_service::merge_attributes;
use super::{LlmServices, SummarizeInput};
use crate::error::{LlmError, LlmResult};
use crate::prompts::{InsightFocus, SummaryType};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// The AI operations a background analysis job sequences
///
/// Implemented over the real providers by [`LlmGateway`]; tests substitute
/// scripted implementations.
#[async_trait]
pub trait DocumentIntelligence: Send + Sync {
    /// Upload a stored file; returns the provider file id
    async fn upload_file(&self, path: &Path, filename: &str) -> LlmResult<String>;

    /// Index an uploaded file with attributes; returns the vector store file id
    async fn attach_to_vector_store(
        &self,
        file_id: &str,
        attributes: Map<String, Value>,
    ) -> LlmResult<String>;

    async fn summarize_document(&self, file_id: &str) -> LlmResult<String>;

    async fn generate_insights(&self, file_ids: &[String], focus: InsightFocus) -> LlmResult<String>;

    async fn answer_question(&self, question: &str, file_ids: &[String]) -> LlmResult<String>;
}

/// [`DocumentIntelligence`] over OpenAI using the default vector store
#[derive(Debug, Clone)]
pub struct LlmGateway {
    services: Arc<LlmServices>,
}

impl LlmGateway {
    pub fn new(services: Arc<LlmServices>) -> Self {
        Self { services }
    }

    fn vector_store(&self) -> LlmResult<String> {
        self.services.vector_store_or_default(None)
    }
}

#[async_trait]
impl DocumentIntelligence for LlmGateway {
    async fn upload_file(&self, path: &Path, filename: &str) -> LlmResult<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| LlmError::InvalidInput(format!("Cannot read {}: {}", path.display(), e)))?;
        let file = self.services.documents.upload_bytes(bytes, filename).await?;
        Ok(file.id)
    }

    async fn attach_to_vector_store(
        &self,
        file_id: &str,
        attributes: Map<String, Value>,
    ) -> LlmResult<String> {
        let vector_store_id = self.vector_store()?;
        let attributes = merge_attributes(&Map::new(), &Map::new(), &attributes, file_id);
        let vs_file = self
            .services
            .documents
            .attach(&vector_store_id, file_id, &attributes)
            .await?;
        Ok(vs_file.id)
    }

    async fn summarize_document(&self, file_id: &str) -> LlmResult<String> {
        let outcome = self
            .services
            .analysis
            .summarize(SummarizeInput::Document(file_id.to_string()), SummaryType::Executive)
            .await?;
        Ok(outcome.summary)
    }

    async fn generate_insights(&self, file_ids: &[String], focus: InsightFocus) -> LlmResult<String> {
        let outcome = self.services.analysis.investment_insights(file_ids, focus).await?;
        Ok(outcome.insights)
    }

    async fn answer_question(&self, question: &str, file_ids: &[String]) -> LlmResult<String> {
        let vector_store_id = self.vector_store()?;
        let outcome = self
            .services
            .chat
            .document_qa(question, file_ids, &vector_store_id, Vec::new())
            .await?;
        Ok(outcome.answer)
    }
}
