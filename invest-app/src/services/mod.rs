//! Business services: approval workflow, notifications, upload storage,
//! accounts and the background job processor

pub mod bootstrap;
pub mod job_processor;
pub mod notifier;
pub mod password;
pub mod storage;
pub mod workflow;

pub use job_processor::{JobOutcome, JobProcessor};
pub use storage::DocumentStorage;
pub use workflow::WorkflowService;

use thiserror::Error;

/// Service-level failures, mapped onto HTTP statuses by the API layer
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Actor lacks the role or ownership the operation needs
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Operation is not valid in the current state
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Common(#[from] invest_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Common(invest_common::Error::Database(err))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
