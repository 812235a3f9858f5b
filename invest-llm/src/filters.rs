//! Vector store attribute filters for file search

use serde::{Deserialize, Serialize};

/// Attribute key holding the provider file id
pub const FILE_ID_ATTRIBUTE: &str = "file_id";

/// Comparison or compound filter in the OpenAI file_search format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileFilter {
    Eq { key: String, value: String },
    Or { filters: Vec<FileFilter> },
}

impl FileFilter {
    /// Restrict a search to the given provider file ids
    ///
    /// No ids means no restriction (search the whole store).
    pub fn for_documents(document_ids: &[String]) -> Option<FileFilter> {
        match document_ids {
            [] => None,
            [only] => Some(Self::file_id(only)),
            many => Some(FileFilter::Or {
                filters: many.iter().map(|id| Self::file_id(id)).collect(),
            }),
        }
    }

    fn file_id(id: &str) -> FileFilter {
        FileFilter::Eq {
            key: FILE_ID_ATTRIBUTE.to_string(),
            value: id.to_string(),
        }
    }
}
