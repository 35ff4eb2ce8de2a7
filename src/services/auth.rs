use crate::error::{Error, Result};
use crate::models::User;
use crate::repositories::{Repositories, UserRepository};
use crate::utils::password::HashService;

/// Interactive login.
#[derive(Clone)]
pub struct AuthService {
    repos: Repositories,
    hash: HashService,
}

impl AuthService {
    pub fn new(repos: Repositories, hash: HashService) -> Self {
        Self { repos, hash }
    }

    /// Authenticate by email or username. Unknown identifier, wrong
    /// password and deactivated account all collapse to
    /// `InvalidCredentials`.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<User> {
        let identifier = normalize_identifier(identifier);

        let user = self
            .repos
            .users
            .find_by_identifier(&identifier)
            .await?
            .ok_or(Error::InvalidCredentials)?;

        if !self.hash.verify(password, &user.password_hash)? {
            return Err(Error::InvalidCredentials);
        }

        if !user.can_login() {
            tracing::warn!(user_id = %user.id, "login attempt on deactivated account");
            return Err(Error::InvalidCredentials);
        }

        Ok(user)
    }
}

/// Emails match case-insensitively; usernames are matched as typed.
pub fn normalize_identifier(identifier: &str) -> String {
    let trimmed = identifier.trim();
    if trimmed.contains('@') {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    }
}
