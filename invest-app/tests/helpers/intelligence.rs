//! Scripted stand-in for the LLM providers

use async_trait::async_trait;
use invest_llm::prompts::InsightFocus;
use invest_llm::{DocumentIntelligence, LlmError, LlmResult};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

pub const UPLOAD: &str = "upload_file";
pub const ATTACH: &str = "attach_to_vector_store";
pub const SUMMARIZE: &str = "summarize_document";
pub const INSIGHTS: &str = "generate_insights";
pub const ANSWER: &str = "answer_question";

/// Records every call and fails operations a configured number of times
#[derive(Default)]
pub struct ScriptedIntelligence {
    calls: Mutex<Vec<&'static str>>,
    failures: Mutex<HashMap<&'static str, usize>>,
    attributes: Mutex<Vec<Map<String, Value>>>,
}

impl ScriptedIntelligence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `operation` fail its next `times` calls
    pub fn failing(operation: &'static str, times: usize) -> Self {
        let scripted = Self::default();
        scripted.failures.lock().unwrap().insert(operation, times);
        scripted
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == operation).count()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Attributes passed to each vector store attach
    pub fn attached_attributes(&self) -> Vec<Map<String, Value>> {
        self.attributes.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str) -> LlmResult<()> {
        self.calls.lock().unwrap().push(operation);

        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(LlmError::Api {
                    status: 500,
                    body: format!("{} exploded", operation),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentIntelligence for ScriptedIntelligence {
    async fn upload_file(&self, path: &Path, filename: &str) -> LlmResult<String> {
        self.record(UPLOAD)?;
        assert!(path.exists(), "upload of missing file {}", path.display());
        Ok(format!("file-{}", filename))
    }

    async fn attach_to_vector_store(&self, file_id: &str, attributes: Map<String, Value>) -> LlmResult<String> {
        self.record(ATTACH)?;
        self.attributes.lock().unwrap().push(attributes);
        Ok(format!("vsf-{}", file_id))
    }

    async fn summarize_document(&self, file_id: &str) -> LlmResult<String> {
        self.record(SUMMARIZE)?;
        Ok(format!("Summary of {}", file_id))
    }

    async fn generate_insights(&self, file_ids: &[String], focus: InsightFocus) -> LlmResult<String> {
        self.record(INSIGHTS)?;
        Ok(format!("{} insights for {}", focus.as_str(), file_ids.join(",")))
    }

    async fn answer_question(&self, question: &str, file_ids: &[String]) -> LlmResult<String> {
        self.record(ANSWER)?;
        Ok(format!("Answer to '{}' from {} document(s)", question, file_ids.len()))
    }
}
