use serde::{Deserialize, Serialize};

use crate::dto::user::UserResponse;
use crate::error::{Error, Result};

pub const IDENTIFIER_MIN: usize = 3;
pub const IDENTIFIER_MAX: usize = 30;

/// Login submission, from the login form or a JSON client.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email_or_username: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
    pub return_url: Option<String>,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<()> {
        let len = self.email_or_username.trim().chars().count();
        if !(IDENTIFIER_MIN..=IDENTIFIER_MAX).contains(&len) {
            return Err(Error::validation(format!(
                "email_or_username must be between {IDENTIFIER_MIN} and {IDENTIFIER_MAX} characters"
            )));
        }
        if self.password.is_empty() {
            return Err(Error::validation("password must not be empty"));
        }
        Ok(())
    }

    /// Only same-origin relative paths are accepted as post-login targets.
    pub fn safe_return_url(&self) -> Option<&str> {
        self.return_url
            .as_deref()
            .filter(|url| url.starts_with('/') && !url.starts_with("//"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(identifier: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email_or_username: identifier.to_string(),
            password: password.to_string(),
            remember_me: false,
            return_url: None,
        }
    }

    #[test]
    fn identifier_length_window() {
        assert!(request("user@example.com", "pw").validate().is_ok());
        assert!(request("abc", "pw").validate().is_ok());
        assert!(request("ab", "pw").validate().is_err());
        assert!(request(&"a".repeat(31), "pw").validate().is_err());
    }

    #[test]
    fn empty_password_rejected() {
        assert!(request("user@example.com", "").validate().is_err());
    }

    #[test]
    fn return_url_must_be_relative() {
        let mut req = request("user@example.com", "pw");
        req.return_url = Some("/auth/authorize?client_id=x".into());
        assert_eq!(
            req.safe_return_url(),
            Some("/auth/authorize?client_id=x")
        );

        req.return_url = Some("https://evil.example/phish".into());
        assert_eq!(req.safe_return_url(), None);

        req.return_url = Some("//evil.example/phish".into());
        assert_eq!(req.safe_return_url(), None);
    }
}
