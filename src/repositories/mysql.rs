//! MySQL implementations of the repository contracts.
//!
//! All queries use the runtime API with bound parameters. Single-use and
//! revocation transitions rely on `rows_affected` from guarded `UPDATE`
//! statements, which keeps each transition a single atomic statement.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{AuthCode, AuthCodeRow, Client, Consent, Session, User};

fn map_db_error(e: sqlx::Error, conflict_message: &str) -> Error {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return Error::Conflict(conflict_message.to_string());
        }
    }
    Error::ServerError(anyhow::anyhow!("database error: {e}"))
}

fn server_error(e: sqlx::Error) -> Error {
    Error::ServerError(anyhow::anyhow!("database error: {e}"))
}

#[derive(Clone)]
pub struct MySqlUserRepository {
    pool: MySqlPool,
}

impl MySqlUserRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, email, username, password_hash, full_name, roles, \
     is_active, email_verified, created_at, updated_at";

#[async_trait]
impl super::UserRepository for MySqlUserRepository {
    async fn create(&self, user: &User) -> Result<()> {
        let roles = serde_json::to_value(&user.roles)
            .map_err(|e| Error::ServerError(anyhow::anyhow!("failed to serialize roles: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO users
            (id, email, username, password_hash, full_name, roles, is_active, email_verified, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&roles)
        .bind(user.is_active)
        .bind(user.email_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "email or username already registered"))?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(server_error)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(server_error)
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ? OR username = ? LIMIT 1"
        ))
        .bind(identifier)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(server_error)
    }

    async fn update(&self, user: &User) -> Result<()> {
        let roles = serde_json::to_value(&user.roles)
            .map_err(|e| Error::ServerError(anyhow::anyhow!("failed to serialize roles: {e}")))?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = ?, username = ?, password_hash = ?, full_name = ?, roles = ?,
                is_active = ?, email_verified = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&roles)
        .bind(user.is_active)
        .bind(user.email_verified)
        .bind(Utc::now())
        .bind(user.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "email or username already registered"))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound("User"));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct MySqlClientRepository {
    pool: MySqlPool,
}

impl MySqlClientRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

const CLIENT_COLUMNS: &str = "id, client_id, client_secret_hash, client_secret_old_hash, \
     secret_old_expires_at, client_name, redirect_uris, grant_types, is_public, is_active, \
     user_id, created_at, updated_at";

#[async_trait]
impl super::ClientRepository for MySqlClientRepository {
    async fn create(&self, client: &Client) -> Result<()> {
        let redirect_uris = serde_json::to_value(&client.redirect_uris)
            .map_err(|e| Error::ServerError(anyhow::anyhow!("failed to serialize uris: {e}")))?;
        let grant_types = serde_json::to_value(&client.grant_types)
            .map_err(|e| Error::ServerError(anyhow::anyhow!("failed to serialize grants: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO clients
            (id, client_id, client_secret_hash, client_secret_old_hash, secret_old_expires_at,
             client_name, redirect_uris, grant_types, is_public, is_active, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(client.id.to_string())
        .bind(&client.client_id)
        .bind(&client.client_secret_hash)
        .bind(&client.client_secret_old_hash)
        .bind(client.secret_old_expires_at)
        .bind(&client.client_name)
        .bind(&redirect_uris)
        .bind(&grant_types)
        .bind(client.is_public)
        .bind(client.is_active)
        .bind(client.user_id.to_string())
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "client_id already registered"))?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Client>> {
        sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(server_error)
    }

    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Client>> {
        sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE client_id = ?"
        ))
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(server_error)
    }

    async fn list_active_by_owner(&self, user_id: Uuid) -> Result<Vec<Client>> {
        sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients \
             WHERE user_id = ? AND is_active = TRUE ORDER BY created_at DESC"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(server_error)
    }

    async fn update(&self, client: &Client) -> Result<()> {
        let redirect_uris = serde_json::to_value(&client.redirect_uris)
            .map_err(|e| Error::ServerError(anyhow::anyhow!("failed to serialize uris: {e}")))?;
        let grant_types = serde_json::to_value(&client.grant_types)
            .map_err(|e| Error::ServerError(anyhow::anyhow!("failed to serialize grants: {e}")))?;

        let result = sqlx::query(
            r#"
            UPDATE clients
            SET client_secret_hash = ?, client_secret_old_hash = ?, secret_old_expires_at = ?,
                client_name = ?, redirect_uris = ?, grant_types = ?, is_public = ?, is_active = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&client.client_secret_hash)
        .bind(&client.client_secret_old_hash)
        .bind(client.secret_old_expires_at)
        .bind(&client.client_name)
        .bind(&redirect_uris)
        .bind(&grant_types)
        .bind(client.is_public)
        .bind(client.is_active)
        .bind(Utc::now())
        .bind(client.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(server_error)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Client"));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct MySqlSessionRepository {
    pool: MySqlPool,
}

impl MySqlSessionRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::SessionRepository for MySqlSessionRepository {
    async fn create(&self, session: &Session) -> Result<()> {
        let metadata = serde_json::to_value(&session.metadata).map_err(|e| {
            Error::ServerError(anyhow::anyhow!("failed to serialize metadata: {e}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, created_at, expires_at, user_agent, ip_address, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(session.user_id.to_string())
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(&session.user_agent)
        .bind(&session.ip_address)
        .bind(&metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "session id collision"))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Session>> {
        sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, created_at, expires_at, user_agent, ip_address, metadata
            FROM sessions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(server_error)
    }

    async fn update(&self, session: &Session) -> Result<()> {
        let metadata = serde_json::to_value(&session.metadata).map_err(|e| {
            Error::ServerError(anyhow::anyhow!("failed to serialize metadata: {e}"))
        })?;

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET expires_at = ?, metadata = ?
            WHERE id = ?
            "#,
        )
        .bind(session.expires_at)
        .bind(&metadata)
        .bind(&session.id)
        .execute(&self.pool)
        .await
        .map_err(server_error)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Session"));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(server_error)?;
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await
            .map_err(server_error)?;
        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub struct MySqlAuthCodeRepository {
    pool: MySqlPool,
}

impl MySqlAuthCodeRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::AuthCodeRepository for MySqlAuthCodeRepository {
    async fn create(&self, auth_code: &AuthCode) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_codes
            (code, user_id, client_id, redirect_uri, code_challenge, code_challenge_method,
             scope, state, created_at, expires_at, used, used_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&auth_code.code)
        .bind(auth_code.user_id.to_string())
        .bind(&auth_code.client_id)
        .bind(&auth_code.redirect_uri)
        .bind(auth_code.code_challenge.challenge())
        .bind(auth_code.code_challenge.method().as_str())
        .bind(&auth_code.scope)
        .bind(&auth_code.state)
        .bind(auth_code.created_at)
        .bind(auth_code.expires_at)
        .bind(auth_code.used)
        .bind(auth_code.used_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "authorization code collision"))?;

        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<AuthCode>> {
        let row = sqlx::query_as::<_, AuthCodeRow>(
            r#"
            SELECT code, user_id, client_id, redirect_uri, code_challenge, code_challenge_method,
                   scope, state, created_at, expires_at, used, used_at
            FROM auth_codes
            WHERE code = ?
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(server_error)?;

        row.map(AuthCode::try_from).transpose()
    }

    async fn mark_used(&self, code: &str) -> Result<bool> {
        // Guarded update: exactly one concurrent exchange sees rows_affected=1.
        let result = sqlx::query(
            r#"
            UPDATE auth_codes
            SET used = TRUE, used_at = ?
            WHERE code = ? AND used = FALSE
            "#,
        )
        .bind(Utc::now())
        .bind(code)
        .execute(&self.pool)
        .await
        .map_err(server_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_expired_or_used(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM auth_codes WHERE expires_at < NOW() OR used = TRUE")
            .execute(&self.pool)
            .await
            .map_err(server_error)?;
        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub struct MySqlConsentRepository {
    pool: MySqlPool,
}

impl MySqlConsentRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::ConsentRepository for MySqlConsentRepository {
    async fn upsert(&self, user_id: Uuid, client_id: &str, scopes: &[String]) -> Result<Consent> {
        let id = Uuid::new_v4();
        let scopes_json = serde_json::to_value(scopes)
            .map_err(|e| Error::ServerError(anyhow::anyhow!("failed to serialize scopes: {e}")))?;

        // The (user_id, client_id) unique key makes this a single atomic
        // replace under concurrent approvals.
        sqlx::query(
            r#"
            INSERT INTO consents (id, user_id, client_id, scopes, granted_at, expires_at, revoked_at)
            VALUES (?, ?, ?, ?, ?, NULL, NULL)
            ON DUPLICATE KEY UPDATE
                scopes = VALUES(scopes),
                granted_at = VALUES(granted_at),
                expires_at = NULL,
                revoked_at = NULL
            "#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(client_id)
        .bind(&scopes_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(server_error)?;

        self.find_by_user_and_client(user_id, client_id)
            .await?
            .ok_or_else(|| Error::ServerError(anyhow::anyhow!("failed to fetch upserted consent")))
    }

    async fn find_by_user_and_client(
        &self,
        user_id: Uuid,
        client_id: &str,
    ) -> Result<Option<Consent>> {
        sqlx::query_as::<_, Consent>(
            r#"
            SELECT id, user_id, client_id, scopes, granted_at, expires_at, revoked_at
            FROM consents
            WHERE user_id = ? AND client_id = ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(server_error)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Consent>> {
        sqlx::query_as::<_, Consent>(
            r#"
            SELECT id, user_id, client_id, scopes, granted_at, expires_at, revoked_at
            FROM consents
            WHERE user_id = ?
            ORDER BY granted_at DESC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(server_error)
    }

    async fn revoke(&self, user_id: Uuid, client_id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE consents
            SET revoked_at = ?
            WHERE user_id = ? AND client_id = ? AND revoked_at IS NULL
            "#,
        )
        .bind(Utc::now())
        .bind(user_id.to_string())
        .bind(client_id)
        .execute(&self.pool)
        .await
        .map_err(server_error)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Consent"));
        }
        Ok(())
    }
}

/// Connectivity probe for the deep health endpoint.
pub struct MySqlStoreHealth {
    pool: MySqlPool,
}

impl MySqlStoreHealth {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl crate::health::HealthCheck for MySqlStoreHealth {
    fn name(&self) -> &'static str {
        "mysql"
    }

    async fn check(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
