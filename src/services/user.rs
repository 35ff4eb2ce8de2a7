//! User registration, profile management and consent listing.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::User;
use crate::repositories::{
    ClientRepository, ConsentRepository, Repositories, UserRepository,
};
use crate::utils::password::HashService;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 30;
pub const PASSWORD_MIN: usize = 8;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"))
}

/// Validated registration input.
#[derive(Debug, Clone)]
pub struct RegisterUser {
    pub email: String,
    pub password: String,
    pub username: Option<String>,
    pub full_name: Option<String>,
}

/// Profile fields a user may change; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub full_name: Option<String>,
}

/// A granted consent joined with the client's display name.
#[derive(Debug, Clone, Serialize)]
pub struct ConsentInfo {
    pub client_id: String,
    pub client_name: String,
    pub scopes: Vec<String>,
    pub granted_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct UserService {
    repos: Repositories,
    hash: HashService,
}

impl UserService {
    pub fn new(repos: Repositories, hash: HashService) -> Self {
        Self { repos, hash }
    }

    pub async fn register(&self, input: RegisterUser) -> Result<User> {
        let email = input.email.trim().to_lowercase();
        if !email_regex().is_match(&email) {
            return Err(Error::validation("invalid email address"));
        }
        if input.password.chars().count() < PASSWORD_MIN {
            return Err(Error::validation(format!(
                "password must be at least {PASSWORD_MIN} characters"
            )));
        }
        if let Some(username) = &input.username {
            validate_username(username)?;
        }

        if self.repos.users.find_by_email(&email).await?.is_some() {
            return Err(Error::Conflict("email already registered".to_string()));
        }

        let user = User::new(
            email,
            input.username,
            self.hash.hash(&input.password)?,
            input.full_name,
        );
        self.repos.users.create(&user).await?;
        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn fetch(&self, user_id: Uuid) -> Result<User> {
        self.repos
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(Error::NotFound("User"))
    }

    pub async fn update(&self, user_id: Uuid, input: UpdateUser) -> Result<User> {
        let mut user = self.fetch(user_id).await?;

        if let Some(username) = input.username {
            validate_username(&username)?;
            user.username = Some(username);
        }
        if let Some(full_name) = input.full_name {
            user.full_name = Some(full_name);
        }
        user.updated_at = Utc::now();

        self.repos.users.update(&user).await?;
        Ok(user)
    }

    /// Change the password after re-verifying the current one.
    pub async fn update_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let mut user = self.fetch(user_id).await?;

        if !self.hash.verify(current_password, &user.password_hash)? {
            return Err(Error::InvalidCredentials);
        }
        if new_password.chars().count() < PASSWORD_MIN {
            return Err(Error::validation(format!(
                "password must be at least {PASSWORD_MIN} characters"
            )));
        }

        user.password_hash = self.hash.hash(new_password)?;
        user.updated_at = Utc::now();
        self.repos.users.update(&user).await?;
        tracing::info!(user_id = %user.id, "password changed");
        Ok(())
    }

    /// Active consents for the user, with client display names resolved.
    pub async fn list_consents(&self, user_id: Uuid) -> Result<Vec<ConsentInfo>> {
        let consents = self.repos.consents.list_by_user(user_id).await?;

        let mut infos = Vec::with_capacity(consents.len());
        for consent in consents {
            if !consent.is_active() {
                continue;
            }
            if let Some(client) = self
                .repos
                .clients
                .find_by_client_id(&consent.client_id)
                .await?
            {
                infos.push(ConsentInfo {
                    client_id: consent.client_id,
                    client_name: client.client_name,
                    scopes: consent.scopes,
                    granted_at: consent.granted_at,
                });
            }
        }
        Ok(infos)
    }

    pub async fn revoke_consent(&self, user_id: Uuid, client_id: &str) -> Result<()> {
        self.repos.consents.revoke(user_id, client_id).await
    }
}

fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(Error::validation(format!(
            "username must be between {USERNAME_MIN} and {USERNAME_MAX} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::{Client, GrantType};
    use crate::repositories::{ClientRepository, ConsentRepository};

    fn service() -> UserService {
        UserService::new(Repositories::in_memory(), HashService::new(4))
    }

    fn register_input() -> RegisterUser {
        RegisterUser {
            email: "User@Example.com ".into(),
            password: "pw123456".into(),
            username: Some("alice".into()),
            full_name: None,
        }
    }

    #[tokio::test]
    async fn register_normalizes_email() {
        let svc = service();
        let user = svc.register(register_input()).await.unwrap();
        assert_eq!(user.email, "user@example.com");
        assert!(!user.email_verified);
    }

    #[tokio::test]
    async fn register_validation_failures() {
        let svc = service();

        let mut input = register_input();
        input.email = "not-an-email".into();
        assert!(svc.register(input).await.is_err());

        let mut input = register_input();
        input.password = "short".into();
        assert!(svc.register(input).await.is_err());

        let mut input = register_input();
        input.username = Some("ab".into());
        assert!(svc.register(input).await.is_err());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let svc = service();
        svc.register(register_input()).await.unwrap();
        let mut again = register_input();
        again.username = Some("bob".into());
        assert!(matches!(
            svc.register(again).await.unwrap_err(),
            Error::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn update_password_requires_current() {
        let svc = service();
        let user = svc.register(register_input()).await.unwrap();

        assert!(matches!(
            svc.update_password(user.id, "wrong-current", "new-pw-123456")
                .await
                .unwrap_err(),
            Error::InvalidCredentials
        ));

        svc.update_password(user.id, "pw123456", "new-pw-123456")
            .await
            .unwrap();
        let stored = svc.fetch(user.id).await.unwrap();
        assert!(HashService::new(4)
            .verify("new-pw-123456", &stored.password_hash)
            .unwrap());
    }

    #[tokio::test]
    async fn consents_are_listed_with_client_names_and_revocable() {
        let svc = service();
        let user = svc.register(register_input()).await.unwrap();

        let now = Utc::now();
        let client = Client {
            id: Uuid::new_v4(),
            client_id: "demo-001-app".into(),
            client_secret_hash: "$2b$10$hash".into(),
            client_secret_old_hash: None,
            secret_old_expires_at: None,
            client_name: "Demo App".into(),
            redirect_uris: vec!["https://app.example/cb".into()],
            grant_types: vec![GrantType::AuthorizationCode],
            is_public: true,
            is_active: true,
            user_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        svc.repos.clients.create(&client).await.unwrap();
        svc.repos
            .consents
            .upsert(user.id, "demo-001-app", &["read".into()])
            .await
            .unwrap();

        let consents = svc.list_consents(user.id).await.unwrap();
        assert_eq!(consents.len(), 1);
        assert_eq!(consents[0].client_name, "Demo App");
        assert_eq!(consents[0].scopes, vec!["read"]);

        svc.revoke_consent(user.id, "demo-001-app").await.unwrap();
        assert!(svc.list_consents(user.id).await.unwrap().is_empty());
        assert!(matches!(
            svc.revoke_consent(user.id, "demo-001-app")
                .await
                .unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
