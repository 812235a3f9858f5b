//! Uploaded documents and their AI analysis state

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

string_enum! {
    pub enum AnalysisStatus {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: Uuid,
    pub request_id: Uuid,
    pub original_filename: String,
    /// Location under the uploads folder; never sent to clients
    #[serde(skip)]
    pub stored_path: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
    pub analysis_status: AnalysisStatus,
    pub openai_file_id: Option<String>,
    pub vector_store_file_id: Option<String>,
    pub summary: Option<String>,
    pub insights: Option<String>,
    /// Attributes extracted from the filename at vectorization
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
