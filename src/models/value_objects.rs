//! Validated request primitives for the OAuth protocol surface.
//!
//! Each type is constructed through a fallible parser; holding a value means
//! validation already happened. RFC 7636 fixes the base64url alphabet and
//! length bounds used here.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::pkce;

/// Minimum accepted client identifier length.
pub const CLIENT_ID_MIN_LENGTH: usize = 8;
/// Maximum accepted client identifier length.
pub const CLIENT_ID_MAX_LENGTH: usize = 128;

/// A validated OAuth client identifier (8..=128 chars, surrounding
/// whitespace stripped).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("client_id must not be empty"));
        }
        let len = trimmed.chars().count();
        if !(CLIENT_ID_MIN_LENGTH..=CLIENT_ID_MAX_LENGTH).contains(&len) {
            return Err(Error::validation(format!(
                "client_id must be between {CLIENT_ID_MIN_LENGTH} and {CLIENT_ID_MAX_LENGTH} characters"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// PKCE challenge transformation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    #[serde(rename = "S256")]
    S256,
    #[serde(rename = "plain")]
    Plain,
}

impl CodeChallengeMethod {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "S256" => Ok(Self::S256),
            "plain" => Ok(Self::Plain),
            _ => Err(Error::validation(
                "code_challenge_method must be S256 or plain",
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }
}

/// A PKCE code challenge together with its transformation method.
///
/// The challenge survives from the authorize request to the token exchange,
/// stored by value on the authorization code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChallenge {
    challenge: String,
    method: CodeChallengeMethod,
}

impl CodeChallenge {
    /// Minimum challenge length (base64url of a SHA-256 digest).
    pub const MIN_LENGTH: usize = 43;

    pub fn parse(challenge: &str, method: &str) -> Result<Self> {
        let method = CodeChallengeMethod::parse(method)?;
        if challenge.is_empty() {
            return Err(Error::validation("code_challenge must not be empty"));
        }
        if challenge.len() < Self::MIN_LENGTH {
            return Err(Error::validation(format!(
                "code_challenge must be at least {} characters",
                Self::MIN_LENGTH
            )));
        }
        if !is_base64url(challenge) {
            return Err(Error::validation(
                "code_challenge contains characters outside the base64url alphabet",
            ));
        }
        Ok(Self {
            challenge: challenge.to_string(),
            method,
        })
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    pub fn method(&self) -> CodeChallengeMethod {
        self.method
    }

    /// Constant-time equality against a plaintext verifier. Defined only for
    /// the `plain` method.
    pub fn verify_plain(&self, verifier: &str) -> Result<bool> {
        if self.method != CodeChallengeMethod::Plain {
            return Err(Error::validation(
                "verify_plain is only defined for the plain method",
            ));
        }
        Ok(pkce::constant_time_eq(verifier, &self.challenge))
    }
}

/// A PKCE code verifier supplied by the client at the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeVerifier(String);

impl CodeVerifier {
    pub const MIN_LENGTH: usize = 43;
    pub const MAX_LENGTH: usize = 128;

    pub fn parse(raw: &str) -> Result<Self> {
        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&raw.len()) {
            return Err(Error::validation(format!(
                "code_verifier must be between {} and {} characters",
                Self::MIN_LENGTH,
                Self::MAX_LENGTH
            )));
        }
        if !is_base64url(raw) {
            return Err(Error::validation(
                "code_verifier contains characters outside the base64url alphabet",
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_base64url(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
