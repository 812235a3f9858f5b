//! Shared HTTP API helpers
//!
//! Pure functions only; each service wraps them in its own axum middleware.

pub mod auth;

pub use auth::{
    extract_api_key, generate_api_key, generate_session_token, hash_token, validate_api_key,
    ApiKeyError,
};
