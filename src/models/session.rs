use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Interactive browser session, keyed by an opaque id held in a cookie.
///
/// A session is valid strictly while `now < expires_at`; an expired row is
/// treated as absent by every consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Session {
    pub const DEFAULT_TTL_SECS: i64 = 3600;

    pub fn create(
        id: String,
        user_id: Uuid,
        ttl_secs: i64,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            id,
            user_id,
            created_at,
            expires_at: created_at + Duration::seconds(ttl_secs),
            user_agent,
            ip_address,
            metadata: HashMap::new(),
        }
    }

    /// `expires_at <= now` means expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// New session with the deadline pushed out from now; other fields kept.
    pub fn extend(&self, ttl_secs: i64) -> Self {
        Self {
            expires_at: Utc::now() + Duration::seconds(ttl_secs),
            ..self.clone()
        }
    }
}

/// Row type for MySQL query results.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub metadata: serde_json::Value,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        let metadata: HashMap<String, serde_json::Value> =
            serde_json::from_value(row.metadata).unwrap_or_default();
        Self {
            id: row.id,
            user_id: Uuid::parse_str(&row.user_id).unwrap_or_default(),
            created_at: row.created_at,
            expires_at: row.expires_at,
            user_agent: row.user_agent,
            ip_address: row.ip_address,
            metadata,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> for Session {
    fn from_row(row: &'r sqlx::mysql::MySqlRow) -> Result<Self, sqlx::Error> {
        let session_row = SessionRow::from_row(row)?;
        Ok(Session::from(session_row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_computes_expiry_from_ttl() {
        let session = Session::create("sid-1".into(), Uuid::new_v4(), 3600, None, None);
        let ttl = session.expires_at - session.created_at;
        assert_eq!(ttl.num_seconds(), 3600);
        assert!(!session.is_expired());
    }

    #[test]
    fn expiry_boundary_is_strict() {
        let mut session = Session::create("sid-2".into(), Uuid::new_v4(), 3600, None, None);
        session.expires_at = Utc::now() - Duration::seconds(1);
        assert!(session.is_expired());
        session.expires_at = Utc::now();
        assert!(session.is_expired());
    }

    #[test]
    fn extend_preserves_identity_and_pushes_expiry() {
        let session = Session::create(
            "sid-3".into(),
            Uuid::new_v4(),
            10,
            Some("agent".into()),
            Some("127.0.0.1".into()),
        );
        let extended = session.extend(7200);
        assert_eq!(extended.id, session.id);
        assert_eq!(extended.user_id, session.user_id);
        assert_eq!(extended.created_at, session.created_at);
        assert_eq!(extended.user_agent, session.user_agent);
        assert!(extended.expires_at > session.expires_at);
    }
}
