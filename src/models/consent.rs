use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user's standing approval of a client for a set of scopes.
///
/// `(user_id, client_id)` identifies the active row; re-approval replaces
/// the scope set in place, revocation sets `revoked_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Consent {
    pub fn grant(user_id: Uuid, client_id: String, scopes: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            client_id,
            scopes,
            granted_at: Utc::now(),
            expires_at: None,
            revoked_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none() && self.expires_at.map_or(true, |at| at > Utc::now())
    }

    /// Set containment: every requested scope is already granted.
    pub fn has_all_scopes(&self, requested: &[String]) -> bool {
        requested.iter().all(|scope| self.scopes.contains(scope))
    }
}

/// Row type for MySQL query results.
#[derive(Debug, Clone, FromRow)]
pub struct ConsentRow {
    pub id: String,
    pub user_id: String,
    pub client_id: String,
    pub scopes: serde_json::Value,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<ConsentRow> for Consent {
    fn from(row: ConsentRow) -> Self {
        let scopes: Vec<String> = serde_json::from_value(row.scopes).unwrap_or_default();
        Self {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            user_id: Uuid::parse_str(&row.user_id).unwrap_or_default(),
            client_id: row.client_id,
            scopes,
            granted_at: row.granted_at,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> for Consent {
    fn from_row(row: &'r sqlx::mysql::MySqlRow) -> Result<Self, sqlx::Error> {
        let consent_row = ConsentRow::from_row(row)?;
        Ok(Consent::from(consent_row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn consent(scopes: &[&str]) -> Consent {
        Consent::grant(
            Uuid::new_v4(),
            "demo-001-app".into(),
            scopes.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn fresh_grant_is_active() {
        assert!(consent(&["read"]).is_active());
    }

    #[test]
    fn revoked_consent_is_inactive() {
        let mut c = consent(&["read"]);
        c.revoked_at = Some(Utc::now());
        assert!(!c.is_active());
    }

    #[test]
    fn expired_consent_is_inactive() {
        let mut c = consent(&["read"]);
        c.expires_at = Some(Utc::now() - Duration::seconds(1));
        assert!(!c.is_active());
        c.expires_at = Some(Utc::now() + Duration::hours(1));
        assert!(c.is_active());
    }

    #[test]
    fn scope_containment() {
        let c = consent(&["read", "write"]);
        assert!(c.has_all_scopes(&["read".into()]));
        assert!(c.has_all_scopes(&["read".into(), "write".into()]));
        assert!(!c.has_all_scopes(&["read".into(), "admin".into()]));
        assert!(c.has_all_scopes(&[]));
    }
}
