//! HTTP API for the LLM microservice

pub mod analysis;
pub mod auth;
pub mod chat;
pub mod documents;
pub mod error;
pub mod health;

pub use analysis::analysis_routes;
pub use chat::chat_routes;
pub use documents::document_routes;
pub use error::{ApiError, ApiResult};
pub use health::health_routes;
