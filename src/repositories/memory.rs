//! In-memory implementations of the repository contracts.
//!
//! Backing store for development runs without a `DATABASE_URL` and for the
//! test suite. Every mutating operation holds a single write lock for its
//! whole check-and-write span, which serializes the single-use code flip and
//! the consent upsert per the concurrency contract.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{AuthCode, Client, Consent, Session, User};

#[derive(Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

#[async_trait]
impl super::UserRepository for InMemoryUserRepository {
    async fn create(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().await;
        let collision = users.values().any(|u| {
            u.email == user.email
                || (u.username.is_some() && u.username == user.username)
        });
        if collision {
            return Err(Error::Conflict(
                "email or username already registered".to_string(),
            ));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        let by_email = users.values().find(|u| u.email == identifier);
        let found = by_email
            .or_else(|| users.values().find(|u| u.username.as_deref() == Some(identifier)));
        Ok(found.cloned())
    }

    async fn update(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().await;
        let collision = users.values().any(|u| {
            u.id != user.id
                && (u.email == user.email
                    || (u.username.is_some() && u.username == user.username))
        });
        if collision {
            return Err(Error::Conflict(
                "email or username already registered".to_string(),
            ));
        }
        match users.get_mut(&user.id) {
            Some(existing) => {
                *existing = User {
                    updated_at: Utc::now(),
                    ..user.clone()
                };
                Ok(())
            }
            None => Err(Error::NotFound("User")),
        }
    }
}

#[derive(Default, Clone)]
pub struct InMemoryClientRepository {
    clients: Arc<RwLock<HashMap<Uuid, Client>>>,
}

#[async_trait]
impl super::ClientRepository for InMemoryClientRepository {
    async fn create(&self, client: &Client) -> Result<()> {
        let mut clients = self.clients.write().await;
        if clients.values().any(|c| c.client_id == client.client_id) {
            return Err(Error::Conflict("client_id already registered".to_string()));
        }
        clients.insert(client.id, client.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Client>> {
        Ok(self.clients.read().await.get(&id).cloned())
    }

    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Client>> {
        Ok(self
            .clients
            .read()
            .await
            .values()
            .find(|c| c.client_id == client_id)
            .cloned())
    }

    async fn list_active_by_owner(&self, user_id: Uuid) -> Result<Vec<Client>> {
        let mut owned: Vec<Client> = self
            .clients
            .read()
            .await
            .values()
            .filter(|c| c.user_id == user_id && c.is_active)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn update(&self, client: &Client) -> Result<()> {
        let mut clients = self.clients.write().await;
        match clients.get_mut(&client.id) {
            Some(existing) => {
                *existing = Client {
                    updated_at: Utc::now(),
                    ..client.clone()
                };
                Ok(())
            }
            None => Err(Error::NotFound("Client")),
        }
    }
}

#[derive(Default, Clone)]
pub struct InMemorySessionRepository {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

#[async_trait]
impl super::SessionRepository for InMemorySessionRepository {
    async fn create(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(Error::Conflict("session id collision".to_string()));
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn update(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.id) {
            Some(existing) => {
                *existing = session.clone();
                Ok(())
            }
            None => Err(Error::NotFound("Session")),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64> {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at >= now);
        Ok((before - sessions.len()) as u64)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryAuthCodeRepository {
    codes: Arc<RwLock<HashMap<String, AuthCode>>>,
}

#[async_trait]
impl super::AuthCodeRepository for InMemoryAuthCodeRepository {
    async fn create(&self, auth_code: &AuthCode) -> Result<()> {
        let mut codes = self.codes.write().await;
        if codes.contains_key(&auth_code.code) {
            return Err(Error::Conflict("authorization code collision".to_string()));
        }
        codes.insert(auth_code.code.clone(), auth_code.clone());
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<AuthCode>> {
        Ok(self.codes.read().await.get(code).cloned())
    }

    async fn mark_used(&self, code: &str) -> Result<bool> {
        // The write lock spans check and flip, so one concurrent exchange
        // wins and the rest observe `false`.
        let mut codes = self.codes.write().await;
        match codes.get_mut(code) {
            Some(entry) if !entry.used => {
                entry.mark_used();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_expired_or_used(&self) -> Result<u64> {
        let mut codes = self.codes.write().await;
        let now = Utc::now();
        let before = codes.len();
        codes.retain(|_, c| !c.used && c.expires_at >= now);
        Ok((before - codes.len()) as u64)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryConsentRepository {
    consents: Arc<RwLock<Vec<Consent>>>,
}

#[async_trait]
impl super::ConsentRepository for InMemoryConsentRepository {
    async fn upsert(&self, user_id: Uuid, client_id: &str, scopes: &[String]) -> Result<Consent> {
        let mut consents = self.consents.write().await;
        let fresh = Consent::grant(user_id, client_id.to_string(), scopes.to_vec());
        match consents
            .iter_mut()
            .find(|c| c.user_id == user_id && c.client_id == client_id)
        {
            Some(existing) => {
                existing.scopes = fresh.scopes.clone();
                existing.granted_at = fresh.granted_at;
                existing.expires_at = None;
                existing.revoked_at = None;
                Ok(existing.clone())
            }
            None => {
                consents.push(fresh.clone());
                Ok(fresh)
            }
        }
    }

    async fn find_by_user_and_client(
        &self,
        user_id: Uuid,
        client_id: &str,
    ) -> Result<Option<Consent>> {
        Ok(self
            .consents
            .read()
            .await
            .iter()
            .find(|c| c.user_id == user_id && c.client_id == client_id)
            .cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Consent>> {
        let mut owned: Vec<Consent> = self
            .consents
            .read()
            .await
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.granted_at.cmp(&a.granted_at));
        Ok(owned)
    }

    async fn revoke(&self, user_id: Uuid, client_id: &str) -> Result<()> {
        let mut consents = self.consents.write().await;
        match consents
            .iter_mut()
            .find(|c| c.user_id == user_id && c.client_id == client_id && c.revoked_at.is_none())
        {
            Some(consent) => {
                consent.revoked_at = Some(Utc::now());
                Ok(())
            }
            None => Err(Error::NotFound("Consent")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CodeChallenge;
    use crate::repositories::{AuthCodeRepository, ConsentRepository, SessionRepository, UserRepository};

    fn auth_code(code: &str) -> AuthCode {
        AuthCode::create(
            code.to_string(),
            Uuid::new_v4(),
            "demo-001-app".into(),
            "https://app.example/cb".into(),
            CodeChallenge::parse("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM", "S256").unwrap(),
            None,
            None,
            1,
        )
    }

    #[tokio::test]
    async fn mark_used_flips_exactly_once() {
        let repo = InMemoryAuthCodeRepository::default();
        repo.create(&auth_code("code-1")).await.unwrap();

        assert!(repo.mark_used("code-1").await.unwrap());
        assert!(!repo.mark_used("code-1").await.unwrap());
        assert!(!repo.mark_used("missing").await.unwrap());
    }

    #[tokio::test]
    async fn mark_used_single_winner_under_concurrency() {
        let repo = Arc::new(InMemoryAuthCodeRepository::default());
        repo.create(&auth_code("code-2")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(
                async move { repo.mark_used("code-2").await },
            ));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let repo = InMemoryUserRepository::default();
        let user = User::new("dup@example.com".into(), None, "h".into(), None);
        repo.create(&user).await.unwrap();

        let again = User::new("dup@example.com".into(), None, "h".into(), None);
        assert!(matches!(
            repo.create(&again).await.unwrap_err(),
            Error::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn consent_upsert_replaces_scopes_and_clears_revocation() {
        let repo = InMemoryConsentRepository::default();
        let user_id = Uuid::new_v4();

        let first = repo
            .upsert(user_id, "demo-001-app", &["read".into()])
            .await
            .unwrap();
        repo.revoke(user_id, "demo-001-app").await.unwrap();

        let second = repo
            .upsert(user_id, "demo-001-app", &["read".into(), "write".into()])
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.scopes, vec!["read", "write"]);
        assert!(second.revoked_at.is_none());

        let listed = repo.list_by_user(user_id).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn expired_sessions_are_dropped() {
        let repo = InMemorySessionRepository::default();
        let live = Session::create("live".into(), Uuid::new_v4(), 3600, None, None);
        let mut dead = Session::create("dead".into(), Uuid::new_v4(), 3600, None, None);
        dead.expires_at = Utc::now() - chrono::Duration::seconds(5);
        repo.create(&live).await.unwrap();
        repo.create(&dead).await.unwrap();

        assert_eq!(repo.delete_expired().await.unwrap(), 1);
        assert!(repo.find_by_id("live").await.unwrap().is_some());
        assert!(repo.find_by_id("dead").await.unwrap().is_none());
    }
}
