//! First-run administrator account

use invest_common::api::generate_session_token;
use invest_common::config::BootstrapAdmin;
use invest_common::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use super::password::hash_password;
use crate::db::{self, now};
use crate::models::{Role, User};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// Create an admin when the database has no users
///
/// Without configured credentials a random password is generated and
/// logged once. Returns the created user.
pub async fn ensure_admin(pool: &SqlitePool, configured: Option<&BootstrapAdmin>) -> Result<Option<User>> {
    if db::users::count_users(pool).await? > 0 {
        return Ok(None);
    }

    let (username, password) = match configured {
        Some(admin) if !admin.username.trim().is_empty() && !admin.password.is_empty() => {
            (admin.username.trim().to_string(), admin.password.clone())
        }
        _ => {
            let password = generate_session_token();
            warn!(
                "No bootstrap_admin configured; created '{}' with generated password: {}",
                DEFAULT_ADMIN_USERNAME, password
            );
            (DEFAULT_ADMIN_USERNAME.to_string(), password)
        }
    };

    let created = now();
    let user = User {
        id: Uuid::new_v4(),
        display_name: "Administrator".to_string(),
        username,
        email: None,
        role: Role::Admin,
        active: true,
        password_hash: hash_password(&password)?,
        created_at: created,
        updated_at: created,
    };
    db::users::insert_user(pool, &user).await?;

    info!(user = %user.username, "Bootstrap administrator created");
    Ok(Some(user))
}
