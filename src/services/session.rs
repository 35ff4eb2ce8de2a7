use crate::error::{Error, Result};
use crate::models::Session;
use crate::repositories::{Repositories, SessionRepository};
use crate::utils::secret::generate_session_id;

/// Session lifecycle: establishment at login, validation on protected
/// requests, explicit deletion at logout.
#[derive(Clone)]
pub struct SessionService {
    repos: Repositories,
    ttl_secs: i64,
    remember_me_ttl_secs: i64,
}

impl SessionService {
    /// Attempts before giving up on session-id collisions.
    const CREATE_ATTEMPTS: u32 = 3;

    pub fn new(repos: Repositories, ttl_secs: i64, remember_me_ttl_secs: i64) -> Self {
        Self {
            repos,
            ttl_secs,
            remember_me_ttl_secs,
        }
    }

    /// Create a session for an authenticated user. Id collisions are
    /// retried with a fresh id.
    pub async fn create(
        &self,
        user_id: uuid::Uuid,
        remember_me: bool,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> Result<Session> {
        let ttl = if remember_me {
            self.remember_me_ttl_secs
        } else {
            self.ttl_secs
        };

        let mut last_err = None;
        for _ in 0..Self::CREATE_ATTEMPTS {
            let session = Session::create(
                generate_session_id(),
                user_id,
                ttl,
                user_agent.clone(),
                ip_address.clone(),
            );
            match self.repos.sessions.create(&session).await {
                Ok(()) => {
                    tracing::debug!(
                        session = %&session.id[..8],
                        user_id = %user_id,
                        remember_me,
                        "session created"
                    );
                    return Ok(session);
                }
                Err(Error::Conflict(_)) => {
                    tracing::warn!("session id collision, retrying with a fresh id");
                    last_err = Some(Error::Conflict("session id collision".to_string()));
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            Error::ServerError(anyhow::anyhow!("session creation failed"))
        }))
    }

    /// Resolve a session id to a live session. Expired rows are treated as
    /// absent.
    pub async fn validate(&self, session_id: &str) -> Result<Session> {
        let session = self
            .repos
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or(Error::InvalidSession)?;
        if session.is_expired() {
            return Err(Error::InvalidSession);
        }
        Ok(session)
    }

    /// Push the session deadline out by the standard TTL.
    pub async fn extend(&self, session: &Session) -> Result<Session> {
        let extended = session.extend(self.ttl_secs);
        self.repos.sessions.update(&extended).await?;
        Ok(extended)
    }

    pub async fn delete(&self, session_id: &str) -> Result<()> {
        self.repos.sessions.delete(session_id).await
    }

    pub fn ttl_secs(&self, remember_me: bool) -> i64 {
        if remember_me {
            self.remember_me_ttl_secs
        } else {
            self.ttl_secs
        }
    }
}
