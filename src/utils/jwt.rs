use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::User;
use crate::utils::keys::KeyProvider;

/// Claims carried by an RS256 access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    /// User id.
    pub sub: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub roles: Vec<String>,
    /// Space-separated granted scopes.
    pub scope: String,
    /// Public identifier of the client the token was issued to.
    pub client_id: String,
    pub iss: String,
    pub aud: Vec<String>,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    pub exp: i64,
}

/// RS256 signing and verification. Keys are parsed once at construction and
/// shared; the key id is stamped into every token header as `kid`.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    issuer: String,
    audience: Vec<String>,
    ttl_secs: i64,
    key_id: String,
}

impl JwtService {
    pub fn new(
        keys: &KeyProvider,
        issuer: String,
        audience: Vec<String>,
        ttl_secs: i64,
    ) -> anyhow::Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(keys.private_pem().as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid RSA private key: {e}"))?;
        let decoding_key = DecodingKey::from_rsa_pem(keys.public_pem().as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid RSA public key: {e}"))?;
        Ok(Self {
            encoding_key: Arc::new(encoding_key),
            decoding_key: Arc::new(decoding_key),
            issuer,
            audience,
            ttl_secs,
            key_id: keys.key_id().to_string(),
        })
    }

    /// Sign an access token for a user. `exp` is always `iat + ttl`.
    pub fn sign(&self, user: &User, scope: &str, client_id: &str) -> Result<String> {
        let iat = Utc::now().timestamp();
        let claims = AccessTokenClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            username: user.username.clone(),
            roles: user.roles.clone(),
            scope: scope.to_string(),
            client_id: client_id.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat,
            exp: iat + self.ttl_secs,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.key_id.clone());

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| Error::ServerError(anyhow::anyhow!("token encoding failed: {e}")))
    }

    /// Validate signature, expiry and issuer. When `expected_audience` is
    /// non-empty the token's `aud` claim must contain one of its entries.
    pub fn verify(&self, token: &str, expected_audience: &[String]) -> Result<AccessTokenClaims> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        if expected_audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(expected_audience);
        }

        decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| Error::InvalidToken)
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_keys;

    fn service() -> JwtService {
        JwtService::new(
            &test_keys::provider("test-key-1"),
            "https://auth.example".into(),
            vec!["https://api.example".into()],
            900,
        )
        .unwrap()
    }

    fn user() -> User {
        User::new(
            "user@example.com".into(),
            Some("alice".into()),
            "$2b$10$hash".into(),
            None,
        )
    }

    #[test]
    fn sign_verify_round_trip() {
        let svc = service();
        let user = user();
        let token = svc.sign(&user, "read", "demo-001-app").unwrap();

        let claims = svc
            .verify(&token, &["https://api.example".to_string()])
            .unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, "user@example.com");
        assert_eq!(claims.username.as_deref(), Some("alice"));
        assert_eq!(claims.scope, "read");
        assert_eq!(claims.client_id, "demo-001-app");
        assert_eq!(claims.roles, vec!["user"]);
        assert_eq!(claims.exp, claims.iat + 900);
        let now = Utc::now().timestamp();
        assert!(claims.iat <= now && now <= claims.exp);
    }

    #[test]
    fn header_carries_the_key_id() {
        let svc = service();
        let token = svc.sign(&user(), "read", "demo-001-app").unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("test-key-1"));
        assert_eq!(header.alg, Algorithm::RS256);
    }

    #[test]
    fn verify_rejects_wrong_audience() {
        let svc = service();
        let token = svc.sign(&user(), "read", "demo-001-app").unwrap();
        let err = svc
            .verify(&token, &["https://other.example".to_string()])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidToken));
    }

    #[test]
    fn verify_without_expected_audience_skips_aud() {
        let svc = service();
        let token = svc.sign(&user(), "read", "demo-001-app").unwrap();
        assert!(svc.verify(&token, &[]).is_ok());
    }

    #[test]
    fn verify_rejects_tampered_token() {
        let svc = service();
        let token = svc.sign(&user(), "read", "demo-001-app").unwrap();
        let mut tampered = token.clone();
        tampered.truncate(token.len() - 2);
        assert!(matches!(
            svc.verify(&tampered, &[]).unwrap_err(),
            Error::InvalidToken
        ));
    }

    #[test]
    fn verify_rejects_wrong_issuer() {
        let other = JwtService::new(
            &test_keys::provider("test-key-1"),
            "https://rogue.example".into(),
            vec![],
            900,
        )
        .unwrap();
        let token = other.sign(&user(), "read", "demo-001-app").unwrap();
        assert!(matches!(
            service().verify(&token, &[]).unwrap_err(),
            Error::InvalidToken
        ));
    }
}
