//! Error types for LLM provider calls and services

use thiserror::Error;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM provider and service errors
#[derive(Debug, Error)]
pub enum LlmError {
    /// Connection, timeout or body read failure
    #[error("Network error: {0}")]
    Network(String),

    /// Provider rejected the credentials (HTTP 401)
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Provider throttled the request (HTTP 429)
    #[error("Rate limited by provider")]
    RateLimited,

    /// Any other non-success HTTP status
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Caller supplied an unusable argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A provider or option required for the call is not configured
    #[error("{0} not configured")]
    NotConfigured(String),

    /// Vector store processing ended in `failed` or never finished
    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LlmError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Network(_) | LlmError::RateLimited => true,
            LlmError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LlmError::Parse(err.to_string())
        } else {
            LlmError::Network(err.to_string())
        }
    }
}
