//! Document upload, vectorization and search

use crate::error::{LlmError, LlmResult};
use crate::filters::{FileFilter, FILE_ID_ATTRIBUTE};
use crate::metadata::extract_metadata_from_filename;
use crate::openai::{FileObject, OpenAiClient, ResponseRequest, VectorStoreFile};
use crate::prompts::search_instructions;
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{ChatMessage, ModelReply, Usage};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::{info, warn};

/// Vector store files accept at most this many attributes
pub const MAX_ATTRIBUTES: usize = 16;

/// Where the bytes of an upload come from
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// File on the service's local disk
    Path(PathBuf),
    /// Base64 encoded content with its original filename
    Base64 { content: String, filename: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub file: FileObject,
    pub vector_store_file: VectorStoreFile,
    pub applied_attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub response: String,
    pub model: String,
    pub usage: Usage,
    pub query: String,
    pub document_ids: Vec<String>,
    pub vector_store_id: String,
}

/// Merge attribute layers for a vector store file
///
/// Precedence, highest first: `file_id`, custom, file properties, auto-extracted.
/// Only scalar values are kept. Once [`MAX_ATTRIBUTES`] keys are present the
/// remaining lower-precedence keys are dropped.
pub fn merge_attributes(
    auto: &Map<String, Value>,
    file: &Map<String, Value>,
    custom: &Map<String, Value>,
    file_id: &str,
) -> Map<String, Value> {
    let mut merged = Map::new();
    merged.insert(FILE_ID_ATTRIBUTE.to_string(), Value::from(file_id));

    for layer in [custom, file, auto] {
        for (key, value) in layer {
            if merged.len() >= MAX_ATTRIBUTES {
                return merged;
            }
            if merged.contains_key(key) {
                continue;
            }
            if !(value.is_string() || value.is_number() || value.is_boolean()) {
                warn!(key = %key, "Dropping non-scalar vector store attribute");
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }
    }

    merged
}

#[derive(Debug, Clone)]
pub struct DocumentService {
    openai: OpenAiClient,
    model: String,
    retry: RetryPolicy,
}

impl DocumentService {
    pub fn new(openai: OpenAiClient, model: &str, retry: RetryPolicy) -> Self {
        Self {
            openai,
            model: model.to_string(),
            retry,
        }
    }

    pub fn openai(&self) -> &OpenAiClient {
        &self.openai
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Read the source into memory, returning bytes and filename
    pub async fn load_source(source: &DocumentSource) -> LlmResult<(Vec<u8>, String)> {
        match source {
            DocumentSource::Path(path) => {
                if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                    return Err(LlmError::InvalidInput(format!("File not found: {}", path.display())));
                }
                let bytes = tokio::fs::read(path).await?;
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| LlmError::InvalidInput(format!("No filename in {}", path.display())))?;
                Ok((bytes, filename))
            }
            DocumentSource::Base64 { content, filename } => {
                let bytes = STANDARD
                    .decode(content.trim())
                    .map_err(|e| LlmError::InvalidInput(format!("Invalid base64 content: {}", e)))?;
                Ok((bytes, filename.clone()))
            }
        }
    }

    /// Upload bytes to OpenAI Files, retrying transient failures
    pub async fn upload_bytes(&self, bytes: Vec<u8>, filename: &str) -> LlmResult<FileObject> {
        with_retry("file upload", &self.retry, || {
            self.openai.upload_file(bytes.clone(), filename)
        })
        .await
    }

    /// Attach a file to a vector store, retrying transient failures
    pub async fn attach(
        &self,
        vector_store_id: &str,
        file_id: &str,
        attributes: &Map<String, Value>,
    ) -> LlmResult<VectorStoreFile> {
        with_retry("vector store attach", &self.retry, || {
            self.openai
                .attach_file_to_vector_store(vector_store_id, file_id, attributes)
        })
        .await
    }

    /// Upload a document and index it in a vector store with metadata attributes
    pub async fn upload_and_vectorize(
        &self,
        source: DocumentSource,
        vector_store_id: &str,
        custom_attributes: &Map<String, Value>,
    ) -> LlmResult<UploadOutcome> {
        let (bytes, filename) = Self::load_source(&source).await?;
        let file = self.upload_bytes(bytes, &filename).await?;

        let auto = extract_metadata_from_filename(&filename).to_attributes();
        let mut file_props = Map::new();
        file_props.insert("file_size_bytes".into(), Value::from(file.bytes.to_string()));
        file_props.insert("upload_timestamp".into(), Value::from(file.created_at.to_string()));
        file_props.insert("openai_filename".into(), Value::from(file.filename.clone()));

        let attributes = merge_attributes(&auto, &file_props, custom_attributes, &file.id);
        let vector_store_file = self.attach(vector_store_id, &file.id, &attributes).await?;

        info!(
            file_id = %file.id,
            vector_store_id,
            attributes = attributes.len(),
            "Document uploaded and vectorized"
        );

        Ok(UploadOutcome {
            file,
            vector_store_file,
            applied_attributes: attributes,
        })
    }

    /// Run a file-search backed Responses API call
    pub async fn file_search(
        &self,
        input: Vec<ChatMessage>,
        instructions: Option<String>,
        temperature: f32,
        vector_store_id: &str,
        document_ids: &[String],
    ) -> LlmResult<ModelReply> {
        let mut request = ResponseRequest::new(self.model.clone(), input)
            .with_temperature(temperature)
            .with_file_search(vector_store_id, FileFilter::for_documents(document_ids));
        if let Some(instructions) = instructions {
            request = request.with_instructions(instructions);
        }

        with_retry("file search response", &self.retry, || {
            self.openai.create_response(&request)
        })
        .await
    }

    /// Answer a query from the documents in a vector store
    ///
    /// An empty `document_ids` searches the whole store.
    pub async fn search_documents(
        &self,
        query: &str,
        document_ids: &[String],
        vector_store_id: &str,
    ) -> LlmResult<SearchOutcome> {
        if query.trim().is_empty() {
            return Err(LlmError::InvalidInput("query is required".to_string()));
        }

        let reply = self
            .file_search(
                vec![ChatMessage::user(query)],
                Some(search_instructions(query, !document_ids.is_empty())),
                0.3,
                vector_store_id,
                document_ids,
            )
            .await?;

        Ok(SearchOutcome {
            response: reply.text,
            model: reply.model,
            usage: reply.usage,
            query: query.to_string(),
            document_ids: document_ids.to_vec(),
            vector_store_id: vector_store_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_precedence_custom_over_file_over_auto() {
        let auto = map(json!({"document_type": "research", "category": "general"}));
        let file = map(json!({"document_type": "file-level", "file_size_bytes": "10"}));
        let custom = map(json!({"document_type": "custom", "file_id": "spoofed"}));

        let merged = merge_attributes(&auto, &file, &custom, "file-123");

        assert_eq!(merged["file_id"], "file-123");
        assert_eq!(merged["document_type"], "custom");
        assert_eq!(merged["file_size_bytes"], "10");
        assert_eq!(merged["category"], "general");
    }

    #[test]
    fn test_attribute_limit_drops_auto_first() {
        let mut custom = Map::new();
        for i in 0..14 {
            custom.insert(format!("c{:02}", i), Value::from(i));
        }
        let file = map(json!({"file_size_bytes": "10"}));
        let auto = map(json!({"category": "general", "year": "2024"}));

        let merged = merge_attributes(&auto, &file, &custom, "file-1");

        assert_eq!(merged.len(), MAX_ATTRIBUTES);
        assert!(merged.contains_key("file_size_bytes"));
        assert!(!merged.contains_key("category"));
        assert!(!merged.contains_key("year"));
    }

    #[test]
    fn test_non_scalar_values_dropped() {
        let custom = map(json!({"tags": ["a", "b"], "team": "growth"}));
        let merged = merge_attributes(&Map::new(), &Map::new(), &custom, "file-1");
        assert!(!merged.contains_key("tags"));
        assert_eq!(merged["team"], "growth");
    }

    #[tokio::test]
    async fn test_invalid_base64_is_invalid_input() {
        let source = DocumentSource::Base64 {
            content: "not base64!!".to_string(),
            filename: "a.pdf".to_string(),
        };
        let err = DocumentService::load_source(&source).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_missing_path_is_invalid_input() {
        let source = DocumentSource::Path(PathBuf::from("/definitely/not/here.pdf"));
        let err = DocumentService::load_source(&source).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_path_source_uses_basename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Deal_Memo_2024.pdf");
        std::fs::write(&path, b"%PDF").unwrap();

        let (bytes, filename) = DocumentService::load_source(&DocumentSource::Path(path)).await.unwrap();
        assert_eq!(bytes, b"%PDF");
        assert_eq!(filename, "Deal_Memo_2024.pdf");
    }
}
