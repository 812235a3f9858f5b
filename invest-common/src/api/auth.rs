//! Service API keys and session tokens
//!
//! The LLM microservice accepts its shared key from, in order of precedence:
//! 1. `Authorization: Bearer <key>`
//! 2. `X-API-Key: <key>`
//! 3. `?api_key=<key>` query parameter
//!
//! Session tokens issued by the approval application are random and only
//! their SHA-256 digest is stored.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Prefix of generated service keys
pub const API_KEY_PREFIX: &str = "llm-";

/// API key validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiKeyError {
    #[error("API key required")]
    Missing,

    #[error("Invalid API key")]
    Invalid,
}

/// Pick the API key out of the request parts
///
/// `query` is the raw query string (without `?`). Blank values are ignored.
pub fn extract_api_key(
    authorization: Option<&str>,
    x_api_key: Option<&str>,
    query: Option<&str>,
) -> Option<String> {
    if let Some(header) = authorization {
        if let Some(token) = header.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    if let Some(key) = x_api_key.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }

    query.and_then(|q| {
        q.split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(name, _)| *name == "api_key")
            .map(|(_, value)| value.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Compare a provided key against the configured one in constant time
pub fn validate_api_key(provided: Option<&str>, expected: &str) -> Result<(), ApiKeyError> {
    let provided = provided.ok_or(ApiKeyError::Missing)?;

    let a = provided.as_bytes();
    let b = expected.as_bytes();
    let mut diff = (a.len() ^ b.len()) as u8;
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= x ^ y;
    }

    if diff == 0 && a.len() == b.len() {
        Ok(())
    } else {
        Err(ApiKeyError::Invalid)
    }
}

/// Generate a new service API key: `llm-` followed by 32 random bytes, URL-safe base64
pub fn generate_api_key() -> String {
    format!("{}{}", API_KEY_PREFIX, random_token())
}

/// Generate an opaque session token (32 random bytes, URL-safe base64)
pub fn generate_session_token() -> String {
    random_token()
}

/// SHA-256 hex digest used to store session tokens
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_takes_precedence() {
        let key = extract_api_key(Some("Bearer abc"), Some("def"), Some("api_key=ghi"));
        assert_eq!(key.as_deref(), Some("abc"));
    }

    #[test]
    fn test_header_then_query() {
        assert_eq!(extract_api_key(None, Some("def"), Some("api_key=ghi")).as_deref(), Some("def"));
        assert_eq!(
            extract_api_key(Some("Basic xyz"), None, Some("x=1&api_key=ghi")).as_deref(),
            Some("ghi")
        );
        assert_eq!(extract_api_key(None, Some("  "), Some("x=1")), None);
    }

    #[test]
    fn test_validate_api_key() {
        assert_eq!(validate_api_key(Some("secret"), "secret"), Ok(()));
        assert_eq!(validate_api_key(Some("secreT"), "secret"), Err(ApiKeyError::Invalid));
        assert_eq!(validate_api_key(Some("secret2"), "secret"), Err(ApiKeyError::Invalid));
        assert_eq!(validate_api_key(None, "secret"), Err(ApiKeyError::Missing));
    }

    #[test]
    fn test_generated_key_shape() {
        let key = generate_api_key();
        assert!(key.starts_with(API_KEY_PREFIX));
        // 32 bytes -> 43 base64 chars without padding
        assert_eq!(key.len(), API_KEY_PREFIX.len() + 43);
        assert_ne!(key, generate_api_key());
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let digest = hash_token("token");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_token("token"));
        assert_ne!(digest, hash_token("other"));
    }
}
