use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::value_objects::CodeChallenge;

/// Single-use authorization code binding a user, client, redirect URI and
/// PKCE challenge for the span between consent approval and token exchange.
///
/// The challenge is stored by value so the binding survives across the two
/// HTTP requests. `used` only ever moves false → true; once true the code is
/// dead regardless of expiry. The store, not this entity, enforces that the
/// flip happens at most once under concurrency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCode {
    pub code: String,
    pub user_id: Uuid,
    pub client_id: String,
    pub redirect_uri: String,
    pub code_challenge: CodeChallenge,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

impl AuthCode {
    /// Hard ceiling on code lifetime.
    pub const MAX_TTL_MINUTES: i64 = 10;
    pub const DEFAULT_TTL_MINUTES: i64 = 1;

    #[allow(clippy::too_many_arguments)]
    pub fn create(
        code: String,
        user_id: Uuid,
        client_id: String,
        redirect_uri: String,
        code_challenge: CodeChallenge,
        scope: Option<String>,
        state: Option<String>,
        expiration_minutes: i64,
    ) -> Self {
        let ttl = expiration_minutes.clamp(1, Self::MAX_TTL_MINUTES);
        let created_at = Utc::now();
        Self {
            code,
            user_id,
            client_id,
            redirect_uri,
            code_challenge,
            scope,
            state,
            created_at,
            expires_at: created_at + Duration::minutes(ttl),
            used: false,
            used_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    pub fn is_valid(&self) -> bool {
        !self.used && !self.is_expired()
    }

    /// Idempotent at the entity level; the repository provides the atomic
    /// compare-and-set across concurrent exchanges.
    pub fn mark_used(&mut self) {
        if !self.used {
            self.used = true;
            self.used_at = Some(Utc::now());
        }
    }
}

/// Row type for MySQL query results.
#[derive(Debug, Clone, FromRow)]
pub struct AuthCodeRow {
    pub code: String,
    pub user_id: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

impl TryFrom<AuthCodeRow> for AuthCode {
    type Error = crate::error::Error;

    fn try_from(row: AuthCodeRow) -> Result<Self, Self::Error> {
        let code_challenge =
            CodeChallenge::parse(&row.code_challenge, &row.code_challenge_method)?;
        Ok(Self {
            code: row.code,
            user_id: Uuid::parse_str(&row.user_id).unwrap_or_default(),
            client_id: row.client_id,
            redirect_uri: row.redirect_uri,
            code_challenge,
            scope: row.scope,
            state: row.state,
            created_at: row.created_at,
            expires_at: row.expires_at,
            used: row.used,
            used_at: row.used_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge() -> CodeChallenge {
        CodeChallenge::parse("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM", "S256").unwrap()
    }

    fn sample_code(ttl_minutes: i64) -> AuthCode {
        AuthCode::create(
            "c".repeat(43),
            Uuid::new_v4(),
            "demo-001-app".into(),
            "https://app.example/cb".into(),
            challenge(),
            Some("read".into()),
            Some("xyz".into()),
            ttl_minutes,
        )
    }

    #[test]
    fn ttl_is_clamped_to_ten_minutes() {
        let code = sample_code(60);
        let ttl = code.expires_at - code.created_at;
        assert_eq!(ttl.num_minutes(), AuthCode::MAX_TTL_MINUTES);
    }

    #[test]
    fn fresh_code_is_valid() {
        let code = sample_code(1);
        assert!(code.is_valid());
        assert!(!code.is_used());
        assert!(!code.is_expired());
    }

    #[test]
    fn used_code_is_invalid_even_before_expiry() {
        let mut code = sample_code(10);
        code.mark_used();
        assert!(code.is_used());
        assert!(code.used_at.is_some());
        assert!(!code.is_valid());
    }

    #[test]
    fn mark_used_is_idempotent() {
        let mut code = sample_code(1);
        code.mark_used();
        let first = code.used_at;
        code.mark_used();
        assert_eq!(code.used_at, first);
    }

    #[test]
    fn expired_code_is_invalid() {
        let mut code = sample_code(1);
        code.expires_at = Utc::now() - Duration::seconds(1);
        assert!(code.is_expired());
        assert!(!code.is_valid());
    }
}
