//! Users and roles

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

string_enum! {
    pub enum Role {
        Analyst => "analyst",
        Manager => "manager",
        CommitteeMember => "committee_member",
        Finance => "finance",
        /// May act at any approval stage and manage users
        Admin => "admin",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub active: bool,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Role check that always admits administrators
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role || self.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_role_strings() {
        assert_eq!(Role::CommitteeMember.as_str(), "committee_member");
        assert_eq!(Role::from_str("finance").unwrap(), Role::Finance);
        assert!(Role::from_str("ceo").is_err());
        assert_eq!(
            serde_json::to_string(&Role::CommitteeMember).unwrap(),
            "\"committee_member\""
        );
    }
}
