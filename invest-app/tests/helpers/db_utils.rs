//! Database fixtures

use invest_app::db;
use invest_app::models::{AnalysisStatus, BackgroundJob, Document, InvestmentRequest, RequestStatus, RiskLevel, Role, User};
use invest_app::services::password::hash_password;
use sqlx::SqlitePool;
use std::path::Path;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "password123";

/// In-memory database with the full schema
pub async fn create_test_db() -> SqlitePool {
    invest_common::db::init_memory_database().await.unwrap()
}

pub async fn create_user(pool: &SqlitePool, username: &str, role: Role) -> User {
    let now = db::now();
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        display_name: format!("{} ({})", username, role),
        email: Some(format!("{}@example.com", username)),
        role,
        active: true,
        password_hash: hash_password(TEST_PASSWORD).unwrap(),
        created_at: now,
        updated_at: now,
    };
    db::users::insert_user(pool, &user).await.unwrap();
    user
}

/// Draft request owned by `requester`
pub async fn create_request(pool: &SqlitePool, requester: &User, title: &str) -> InvestmentRequest {
    let now = db::now();
    let mut request = InvestmentRequest {
        id: Uuid::new_v4(),
        request_code: String::new(),
        title: title.to_string(),
        description: "Series B participation".to_string(),
        investment_type: "venture".to_string(),
        amount: 250_000.0,
        currency: "USD".to_string(),
        expected_return: Some(18.5),
        risk_level: RiskLevel::High,
        status: RequestStatus::Draft,
        requester_id: requester.id,
        template_id: None,
        created_at: now,
        updated_at: now,
        submitted_at: None,
        decided_at: None,
    };

    let mut conn = pool.acquire().await.unwrap();
    db::requests::insert_request(&mut conn, &mut request).await.unwrap();
    request
}

/// Write `content` under `dir` and register it as a document with a queued job
pub async fn upload_document(
    pool: &SqlitePool,
    dir: &Path,
    request: &InvestmentRequest,
    uploader: &User,
    filename: &str,
    content: &[u8],
    max_attempts: u32,
) -> (Document, BackgroundJob) {
    let id = Uuid::new_v4();
    let path = dir.join(format!("{}-{}", id, filename));
    std::fs::write(&path, content).unwrap();

    let now = db::now();
    let document = Document {
        id,
        request_id: request.id,
        original_filename: filename.to_string(),
        stored_path: path.to_string_lossy().into_owned(),
        mime_type: "application/pdf".to_string(),
        size_bytes: content.len() as i64,
        uploaded_by: uploader.id,
        analysis_status: AnalysisStatus::Pending,
        openai_file_id: None,
        vector_store_file_id: None,
        summary: None,
        insights: None,
        metadata: None,
        created_at: now,
        updated_at: now,
    };
    db::documents::insert_document(pool, &document).await.unwrap();
    let job = db::jobs::enqueue_job(pool, id, max_attempts).await.unwrap();
    (document, job)
}
