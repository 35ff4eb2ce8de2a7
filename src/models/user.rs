use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User account.
///
/// The email is stored normalized (trimmed, lowercase); the username is
/// optional but unique when present. The password hash never leaves the
/// process: it is skipped on serialization and omitted from every response
/// DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub roles: Vec<String>,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new active, unverified account with the default role.
    pub fn new(
        email: String,
        username: Option<String>,
        password_hash: String,
        full_name: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            username,
            password_hash,
            full_name,
            roles: vec!["user".to_string()],
            is_active: true,
            email_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// A user can log in exactly while the account is active.
    pub fn can_login(&self) -> bool {
        self.is_active
    }
}

/// Row type for MySQL query results.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub roles: serde_json::Value,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let roles: Vec<String> = serde_json::from_value(row.roles).unwrap_or_default();
        Self {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            full_name: row.full_name,
            roles,
            is_active: row.is_active,
            email_verified: row.email_verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> for User {
    fn from_row(row: &'r sqlx::mysql::MySqlRow) -> Result<Self, sqlx::Error> {
        let user_row = UserRow::from_row(row)?;
        Ok(User::from(user_row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_defaults() {
        let user = User::new("user@example.com".into(), None, "$2b$10$hash".into(), None);
        assert_eq!(user.roles, vec!["user"]);
        assert!(user.is_active);
        assert!(!user.email_verified);
        assert!(user.can_login());
    }

    #[test]
    fn deactivated_user_cannot_login() {
        let mut user = User::new("user@example.com".into(), None, "h".into(), None);
        user.is_active = false;
        assert!(!user.can_login());
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let user = User::new("user@example.com".into(), None, "top-secret".into(), None);
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("top-secret"));
        assert!(!json.contains("password_hash"));
    }
}
