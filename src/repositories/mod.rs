//! Repository contracts for the five persisted lifecycles, plus the bundle
//! handed to services through the composition root.
//!
//! Two stores implement the contracts: MySQL ([`mysql`]) when a
//! `DATABASE_URL` is configured, and an in-memory store ([`memory`]) for
//! development and tests. Calls are cancel-safe: each mutating operation is
//! a single statement (MySQL) or a single lock region (memory), so dropping
//! an in-flight future never leaves a partial write.

pub mod memory;
pub mod mysql;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{AuthCode, Client, Consent, Session, User};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new user. Email and username collisions surface as
    /// `Conflict`.
    async fn create(&self, user: &User) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Resolve a login identifier against email first, then username.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>>;
    async fn update(&self, user: &User) -> Result<()>;
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Persist a new client. A `client_id` collision surfaces as `Conflict`.
    async fn create(&self, client: &Client) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Client>>;
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Client>>;
    /// Active clients owned by a user, newest first. Inactive clients stay
    /// reachable through `find_by_id` for soft-delete recovery.
    async fn list_active_by_owner(&self, user_id: Uuid) -> Result<Vec<Client>>;
    /// Full-row update; secret rotation goes through here so the three
    /// secret fields change together.
    async fn update(&self, client: &Client) -> Result<()>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a new session. A duplicate id surfaces as `Conflict` so the
    /// caller can retry with a fresh id.
    async fn create(&self, session: &Session) -> Result<()>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Session>>;
    async fn update(&self, session: &Session) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
    /// Drop every expired row; returns the count removed.
    async fn delete_expired(&self) -> Result<u64>;
}

#[async_trait]
pub trait AuthCodeRepository: Send + Sync {
    async fn create(&self, auth_code: &AuthCode) -> Result<()>;
    async fn find_by_code(&self, code: &str) -> Result<Option<AuthCode>>;
    /// Atomically flip `used` false → true. Returns `false` when the code is
    /// missing or the flip already happened; exactly one concurrent caller
    /// observes `true`.
    async fn mark_used(&self, code: &str) -> Result<bool>;
    /// Advisory cleanup of expired or used codes; used codes stay unusable
    /// whether or not this has run.
    async fn delete_expired_or_used(&self) -> Result<u64>;
}

#[async_trait]
pub trait ConsentRepository: Send + Sync {
    /// Create or atomically replace the `(user, client)` consent row: scopes
    /// overwritten, `granted_at` refreshed, revocation and expiry cleared.
    async fn upsert(&self, user_id: Uuid, client_id: &str, scopes: &[String]) -> Result<Consent>;
    async fn find_by_user_and_client(
        &self,
        user_id: Uuid,
        client_id: &str,
    ) -> Result<Option<Consent>>;
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Consent>>;
    /// Set `revoked_at` on the active row; `NotFound` when there is none.
    async fn revoke(&self, user_id: Uuid, client_id: &str) -> Result<()>;
}

/// The repository set wired at startup and shared by all services.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub clients: Arc<dyn ClientRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub auth_codes: Arc<dyn AuthCodeRepository>,
    pub consents: Arc<dyn ConsentRepository>,
}

impl Repositories {
    pub fn mysql(pool: sqlx::MySqlPool) -> Self {
        Self {
            users: Arc::new(mysql::MySqlUserRepository::new(pool.clone())),
            clients: Arc::new(mysql::MySqlClientRepository::new(pool.clone())),
            sessions: Arc::new(mysql::MySqlSessionRepository::new(pool.clone())),
            auth_codes: Arc::new(mysql::MySqlAuthCodeRepository::new(pool.clone())),
            consents: Arc::new(mysql::MySqlConsentRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(memory::InMemoryUserRepository::default()),
            clients: Arc::new(memory::InMemoryClientRepository::default()),
            sessions: Arc::new(memory::InMemorySessionRepository::default()),
            auth_codes: Arc::new(memory::InMemoryAuthCodeRepository::default()),
            consents: Arc::new(memory::InMemoryConsentRepository::default()),
        }
    }
}
