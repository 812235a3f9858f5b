//! Document, analysis and chat services over the provider clients

pub mod analysis_service;
pub mod chat_service;
pub mod document_service;
pub mod gateway;

pub use analysis_service::{AnalysisOutcome, AnalysisService, InsightsOutcome, SummarizeInput, SummaryOutcome};
pub use chat_service::{ChatOutcome, ChatService, QaOutcome};
pub use document_service::{
    merge_attributes, DocumentService, DocumentSource, SearchOutcome, UploadOutcome, MAX_ATTRIBUTES,
};
pub use gateway::{DocumentIntelligence, LlmGateway};

use crate::anthropic::AnthropicClient;
use crate::error::{LlmError, LlmResult};
use crate::openai::OpenAiClient;
use crate::retry::RetryPolicy;
use invest_common::config::{resolve_secret, TomlConfig};

pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Provider credentials and defaults shared by all services
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub openai_api_key: String,
    pub anthropic_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub default_vector_store_id: Option<String>,
    pub default_model: String,
    pub retry: RetryPolicy,
}

impl LlmSettings {
    pub fn new(openai_api_key: impl Into<String>) -> Self {
        Self {
            openai_api_key: openai_api_key.into(),
            anthropic_api_key: None,
            openai_base_url: None,
            anthropic_base_url: None,
            default_vector_store_id: None,
            default_model: DEFAULT_MODEL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Resolve provider settings from environment and TOML
    ///
    /// Returns `None` when no OpenAI key is available from either source.
    pub fn resolve(toml: &TomlConfig) -> Option<Self> {
        let openai_api_key = resolve_secret("OpenAI API key", "OPENAI_API_KEY", toml.openai_api_key.as_ref())?;

        Some(Self {
            openai_api_key,
            anthropic_api_key: resolve_secret(
                "Anthropic API key",
                "ANTHROPIC_API_KEY",
                toml.anthropic_api_key.as_ref(),
            ),
            openai_base_url: resolve_secret("OpenAI base URL", "OPENAI_BASE_URL", toml.openai_base_url.as_ref()),
            anthropic_base_url: resolve_secret(
                "Anthropic base URL",
                "ANTHROPIC_BASE_URL",
                toml.anthropic_base_url.as_ref(),
            ),
            default_vector_store_id: resolve_secret(
                "Default vector store",
                "DEFAULT_VECTOR_STORE_ID",
                toml.default_vector_store_id.as_ref(),
            ),
            default_model: DEFAULT_MODEL.to_string(),
            retry: RetryPolicy::default(),
        })
    }
}

/// The three services built from one set of settings
#[derive(Debug, Clone)]
pub struct LlmServices {
    pub documents: DocumentService,
    pub analysis: AnalysisService,
    pub chat: ChatService,
    pub default_vector_store_id: Option<String>,
    pub default_model: String,
}

impl LlmServices {
    pub fn from_settings(settings: &LlmSettings) -> LlmResult<Self> {
        let mut openai = OpenAiClient::new(settings.openai_api_key.clone())?;
        if let Some(url) = &settings.openai_base_url {
            openai = openai.with_base_url(url.clone());
        }
        Ok(Self::with_clients(settings, openai, build_anthropic(settings)?))
    }

    /// Assemble services around already-built clients
    pub fn with_clients(
        settings: &LlmSettings,
        openai: OpenAiClient,
        anthropic: Option<AnthropicClient>,
    ) -> Self {
        let documents = DocumentService::new(openai.clone(), &settings.default_model, settings.retry.clone());
        let analysis = AnalysisService::new(
            documents.clone(),
            settings.default_vector_store_id.clone(),
        );
        let chat = ChatService::new(openai, anthropic, &settings.default_model, settings.retry.clone());

        Self {
            documents,
            analysis,
            chat,
            default_vector_store_id: settings.default_vector_store_id.clone(),
            default_model: settings.default_model.clone(),
        }
    }

    /// Vector store to use when the caller did not name one
    pub fn vector_store_or_default(&self, requested: Option<String>) -> LlmResult<String> {
        requested
            .filter(|id| !id.trim().is_empty())
            .or_else(|| self.default_vector_store_id.clone())
            .ok_or_else(|| LlmError::NotConfigured("Default vector store".to_string()))
    }
}

fn build_anthropic(settings: &LlmSettings) -> LlmResult<Option<AnthropicClient>> {
    let Some(key) = &settings.anthropic_api_key else {
        return Ok(None);
    };
    let mut client = AnthropicClient::new(key.clone())?;
    if let Some(url) = &settings.anthropic_base_url {
        client = client.with_base_url(url.clone());
    }
    Ok(Some(client))
}
