//! The OAuth protocol core: client validation, authorization-code issuance
//! and the code-for-token exchange.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::models::{AuthCode, ClientId, CodeChallenge, CodeVerifier, GrantType};
use crate::repositories::{
    AuthCodeRepository, ClientRepository, Repositories, UserRepository,
};
use crate::utils::jwt::JwtService;
use crate::utils::password::HashService;
use crate::utils::pkce;
use crate::utils::secret::generate_code;

/// Client projection handed to downstream use cases after validation.
#[derive(Debug, Clone, Serialize)]
pub struct ValidatedClient {
    pub client_id: String,
    pub client_name: String,
    pub is_public: bool,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<GrantType>,
}

/// Validated authorize-request payload carried from the authorize endpoint
/// through consent to code issuance.
#[derive(Debug, Clone)]
pub struct AuthorizeCommand {
    pub client_id: ClientId,
    pub redirect_uri: String,
    pub code_challenge: CodeChallenge,
    pub scope: Option<String>,
    pub state: Option<String>,
}

impl AuthorizeCommand {
    /// Requested scopes, split on whitespace.
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default()
    }
}

/// Token-exchange request payload.
#[derive(Debug, Clone)]
pub struct ExchangeCommand {
    pub code: String,
    pub client_id: ClientId,
    pub redirect_uri: String,
    pub code_verifier: CodeVerifier,
    pub client_secret: Option<String>,
}

/// Successful token-exchange body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: String,
}

/// A freshly issued code plus the client's `state`, ready to be turned into
/// the redirect back to the client.
#[derive(Debug, Clone)]
pub struct CodeRedirect {
    pub code: String,
    pub state: Option<String>,
}

impl CodeRedirect {
    /// Append `code` (and `state` when present) to the redirect URI,
    /// preserving any query it already carries.
    pub fn build_redirect_url(&self, redirect_uri: &str) -> Result<String> {
        let mut url = Url::parse(redirect_uri)
            .map_err(|e| Error::ServerError(anyhow::anyhow!("invalid redirect URI: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("code", &self.code);
            if let Some(state) = &self.state {
                pairs.append_pair("state", state);
            }
        }
        Ok(url.to_string())
    }
}

#[derive(Clone)]
pub struct OAuthService {
    repos: Repositories,
    jwt: JwtService,
    hash: HashService,
    code_ttl_minutes: i64,
}

impl OAuthService {
    const CODE_CREATE_ATTEMPTS: u32 = 3;

    pub fn new(
        repos: Repositories,
        jwt: JwtService,
        hash: HashService,
        code_ttl_minutes: i64,
    ) -> Self {
        Self {
            repos,
            jwt,
            hash,
            code_ttl_minutes,
        }
    }

    /// Resolve and check a client for an incoming request. Unknown client,
    /// inactive client, unregistered redirect URI and unsupported grant all
    /// fail with `InvalidClient`.
    pub async fn validate_client(
        &self,
        client_id: &ClientId,
        redirect_uri: &str,
        grant_type: GrantType,
    ) -> Result<ValidatedClient> {
        let client = self
            .repos
            .clients
            .find_by_client_id(client_id.as_str())
            .await?
            .ok_or(Error::InvalidClient)?;

        if !client.is_active {
            return Err(Error::InvalidClient);
        }
        if !client.is_valid_redirect_uri(redirect_uri) {
            return Err(Error::InvalidClient);
        }
        if !client.supports_grant_type(grant_type) {
            return Err(Error::InvalidClient);
        }

        Ok(ValidatedClient {
            client_id: client.client_id,
            client_name: client.client_name,
            is_public: client.is_public,
            redirect_uris: client.redirect_uris,
            grant_types: client.grant_types,
        })
    }

    /// Issue a fresh single-use authorization code for an authenticated
    /// user. Every call produces an independent code.
    pub async fn generate_auth_code(
        &self,
        user_id: uuid::Uuid,
        request: &AuthorizeCommand,
    ) -> Result<CodeRedirect> {
        let client = self
            .validate_client(
                &request.client_id,
                &request.redirect_uri,
                GrantType::AuthorizationCode,
            )
            .await?;

        let mut last_err = None;
        for _ in 0..Self::CODE_CREATE_ATTEMPTS {
            let auth_code = AuthCode::create(
                generate_code(),
                user_id,
                client.client_id.clone(),
                request.redirect_uri.clone(),
                request.code_challenge.clone(),
                request.scope.clone(),
                request.state.clone(),
                self.code_ttl_minutes,
            );
            match self.repos.auth_codes.create(&auth_code).await {
                Ok(()) => {
                    tracing::debug!(
                        client_id = %client.client_id,
                        user_id = %user_id,
                        "authorization code issued"
                    );
                    return Ok(CodeRedirect {
                        code: auth_code.code,
                        state: request.state.clone(),
                    });
                }
                Err(Error::Conflict(_)) => {
                    last_err = Some(Error::Conflict("authorization code collision".to_string()));
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| Error::ServerError(anyhow::anyhow!("code generation failed"))))
    }

    /// Exchange an authorization code for a signed access token.
    ///
    /// All failures surface as OAuth-specific kinds; anything unexpected is
    /// wrapped as `InvalidCreationToken` so internals never leak through the
    /// token endpoint.
    pub async fn exchange_token(&self, request: ExchangeCommand) -> Result<TokenResponse> {
        match self.exchange_inner(request).await {
            ok @ Ok(_) => ok,
            err @ Err(Error::InvalidCode | Error::InvalidClient | Error::InvalidUser) => err,
            Err(other) => {
                tracing::error!("token exchange failed unexpectedly: {other}");
                Err(Error::InvalidCreationToken)
            }
        }
    }

    async fn exchange_inner(&self, request: ExchangeCommand) -> Result<TokenResponse> {
        let auth_code = self
            .repos
            .auth_codes
            .find_by_code(&request.code)
            .await?
            .ok_or(Error::InvalidCode)?;

        if auth_code.is_expired() {
            return Err(Error::InvalidCode);
        }
        if auth_code.is_used() {
            tracing::error!(
                client_id = %auth_code.client_id,
                user_id = %auth_code.user_id,
                "used authorization code presented again, potential replay"
            );
            return Err(Error::InvalidCode);
        }
        if auth_code.client_id != request.client_id.as_str() {
            return Err(Error::InvalidClient);
        }
        if auth_code.redirect_uri != request.redirect_uri {
            return Err(Error::InvalidCode);
        }
        if !pkce::verify(&auth_code.code_challenge, &request.code_verifier) {
            return Err(Error::InvalidCode);
        }

        if let Some(secret) = &request.client_secret {
            self.verify_client_secret(request.client_id.as_str(), secret)
                .await?;
        }

        let user = self
            .repos
            .users
            .find_by_id(auth_code.user_id)
            .await?
            .ok_or(Error::InvalidUser)?;
        if !user.can_login() {
            tracing::warn!(user_id = %user.id, "token exchange for deactivated user denied");
            return Err(Error::InvalidUser);
        }

        // Atomic flip; under concurrent exchanges exactly one caller wins.
        if !self.repos.auth_codes.mark_used(&auth_code.code).await? {
            tracing::error!(
                client_id = %auth_code.client_id,
                user_id = %auth_code.user_id,
                "lost the single-use race on an authorization code, potential replay"
            );
            return Err(Error::InvalidCode);
        }

        let scope = auth_code.scope.clone().unwrap_or_default();
        let access_token = self.jwt.sign(&user, &scope, &auth_code.client_id)?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.ttl_secs(),
            scope,
        })
    }

    /// Confidential-client authentication: the presented secret must match
    /// the current hash, or the previous one while its rotation grace
    /// window is open.
    async fn verify_client_secret(&self, client_id: &str, secret: &str) -> Result<()> {
        let client = self
            .repos
            .clients
            .find_by_client_id(client_id)
            .await?
            .ok_or(Error::InvalidClient)?;

        if self.hash.verify(secret, &client.client_secret_hash)? {
            return Ok(());
        }
        if client.old_secret_valid(chrono::Utc::now()) {
            if let Some(old_hash) = &client.client_secret_old_hash {
                if self.hash.verify(secret, old_hash)? {
                    return Ok(());
                }
            }
        }
        Err(Error::InvalidClient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use crate::models::{Client, User};
    use crate::repositories::{AuthCodeRepository, ClientRepository, UserRepository};
    use crate::utils::test_keys;

    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    struct Fixture {
        service: OAuthService,
        repos: Repositories,
        user: User,
    }

    async fn fixture() -> Fixture {
        let repos = Repositories::in_memory();
        let hash = HashService::new(4);
        let jwt = JwtService::new(
            &test_keys::provider("test-key"),
            "https://auth.example".into(),
            vec!["https://api.example".into()],
            900,
        )
        .unwrap();

        let user = User::new("user@example.com".into(), None, hash.hash("pw123456").unwrap(), None);
        repos.users.create(&user).await.unwrap();

        let now = Utc::now();
        let client = Client {
            id: Uuid::new_v4(),
            client_id: "demo-001-app".into(),
            client_secret_hash: hash.hash("client-secret-1").unwrap(),
            client_secret_old_hash: None,
            secret_old_expires_at: None,
            client_name: "Demo App".into(),
            redirect_uris: vec!["https://app.example/cb".into()],
            grant_types: vec![GrantType::AuthorizationCode],
            is_public: false,
            is_active: true,
            user_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        repos.clients.create(&client).await.unwrap();

        Fixture {
            service: OAuthService::new(repos.clone(), jwt, hash, 1),
            repos,
            user,
        }
    }

    fn authorize_command() -> AuthorizeCommand {
        AuthorizeCommand {
            client_id: ClientId::parse("demo-001-app").unwrap(),
            redirect_uri: "https://app.example/cb".into(),
            code_challenge: CodeChallenge::parse(CHALLENGE, "S256").unwrap(),
            scope: Some("read".into()),
            state: Some("xyz".into()),
        }
    }

    fn exchange_command(code: &str) -> ExchangeCommand {
        ExchangeCommand {
            code: code.to_string(),
            client_id: ClientId::parse("demo-001-app").unwrap(),
            redirect_uri: "https://app.example/cb".into(),
            code_verifier: CodeVerifier::parse(VERIFIER).unwrap(),
            client_secret: None,
        }
    }

    #[tokio::test]
    async fn validate_client_happy_path() {
        let f = fixture().await;
        let validated = f
            .service
            .validate_client(
                &ClientId::parse("demo-001-app").unwrap(),
                "https://app.example/cb",
                GrantType::AuthorizationCode,
            )
            .await
            .unwrap();
        assert_eq!(validated.client_name, "Demo App");
        assert!(!validated.is_public);
    }

    #[tokio::test]
    async fn validate_client_rejections() {
        let f = fixture().await;
        let id = ClientId::parse("demo-001-app").unwrap();

        let unknown = ClientId::parse("nobody-here").unwrap();
        assert!(matches!(
            f.service
                .validate_client(&unknown, "https://app.example/cb", GrantType::AuthorizationCode)
                .await
                .unwrap_err(),
            Error::InvalidClient
        ));

        assert!(matches!(
            f.service
                .validate_client(&id, "https://evil.example/cb", GrantType::AuthorizationCode)
                .await
                .unwrap_err(),
            Error::InvalidClient
        ));

        assert!(matches!(
            f.service
                .validate_client(&id, "https://app.example/cb", GrantType::RefreshToken)
                .await
                .unwrap_err(),
            Error::InvalidClient
        ));
    }

    #[tokio::test]
    async fn inactive_client_is_rejected() {
        let f = fixture().await;
        let mut client = f
            .repos
            .clients
            .find_by_client_id("demo-001-app")
            .await
            .unwrap()
            .unwrap();
        client.is_active = false;
        f.repos.clients.update(&client).await.unwrap();

        assert!(matches!(
            f.service
                .validate_client(
                    &ClientId::parse("demo-001-app").unwrap(),
                    "https://app.example/cb",
                    GrantType::AuthorizationCode,
                )
                .await
                .unwrap_err(),
            Error::InvalidClient
        ));
    }

    #[tokio::test]
    async fn generate_then_exchange_round_trip() {
        let f = fixture().await;
        let redirect = f
            .service
            .generate_auth_code(f.user.id, &authorize_command())
            .await
            .unwrap();
        assert_eq!(redirect.state.as_deref(), Some("xyz"));

        let response = f
            .service
            .exchange_token(exchange_command(&redirect.code))
            .await
            .unwrap();
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 900);
        assert_eq!(response.scope, "read");
        assert!(!response.access_token.is_empty());
    }

    #[tokio::test]
    async fn second_exchange_is_a_replay() {
        let f = fixture().await;
        let redirect = f
            .service
            .generate_auth_code(f.user.id, &authorize_command())
            .await
            .unwrap();

        f.service
            .exchange_token(exchange_command(&redirect.code))
            .await
            .unwrap();
        assert!(matches!(
            f.service
                .exchange_token(exchange_command(&redirect.code))
                .await
                .unwrap_err(),
            Error::InvalidCode
        ));
    }

    #[tokio::test]
    async fn concurrent_exchanges_have_one_winner() {
        let f = fixture().await;
        let redirect = f
            .service
            .generate_auth_code(f.user.id, &authorize_command())
            .await
            .unwrap();

        let service = Arc::new(f.service);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            let code = redirect.code.clone();
            handles.push(tokio::spawn(async move {
                service.exchange_token(exchange_command(&code)).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(Error::InvalidCode) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn wrong_verifier_fails_pkce() {
        let f = fixture().await;
        let redirect = f
            .service
            .generate_auth_code(f.user.id, &authorize_command())
            .await
            .unwrap();

        let mut cmd = exchange_command(&redirect.code);
        cmd.code_verifier = CodeVerifier::parse(&"z".repeat(43)).unwrap();
        assert!(matches!(
            f.service.exchange_token(cmd).await.unwrap_err(),
            Error::InvalidCode
        ));
    }

    #[tokio::test]
    async fn client_and_redirect_binding() {
        let f = fixture().await;

        let redirect = f
            .service
            .generate_auth_code(f.user.id, &authorize_command())
            .await
            .unwrap();
        let mut cmd = exchange_command(&redirect.code);
        cmd.client_id = ClientId::parse("other-client-id").unwrap();
        assert!(matches!(
            f.service.exchange_token(cmd).await.unwrap_err(),
            Error::InvalidClient
        ));

        let redirect = f
            .service
            .generate_auth_code(f.user.id, &authorize_command())
            .await
            .unwrap();
        let mut cmd = exchange_command(&redirect.code);
        cmd.redirect_uri = "https://app.example/other".into();
        assert!(matches!(
            f.service.exchange_token(cmd).await.unwrap_err(),
            Error::InvalidCode
        ));
    }

    #[tokio::test]
    async fn expired_code_is_rejected() {
        let f = fixture().await;

        // Store a code that is already past its deadline.
        let mut auth_code = AuthCode::create(
            "expired-code-expired-code-expired-code-exp1".into(),
            f.user.id,
            "demo-001-app".into(),
            "https://app.example/cb".into(),
            CodeChallenge::parse(CHALLENGE, "S256").unwrap(),
            Some("read".into()),
            None,
            1,
        );
        auth_code.expires_at = Utc::now() - Duration::seconds(1);
        f.repos.auth_codes.create(&auth_code).await.unwrap();

        assert!(matches!(
            f.service
                .exchange_token(exchange_command(&auth_code.code))
                .await
                .unwrap_err(),
            Error::InvalidCode
        ));
    }

    #[tokio::test]
    async fn deactivated_user_gets_no_token() {
        let f = fixture().await;
        let redirect = f
            .service
            .generate_auth_code(f.user.id, &authorize_command())
            .await
            .unwrap();

        let mut user = f.user.clone();
        user.is_active = false;
        f.repos.users.update(&user).await.unwrap();

        assert!(matches!(
            f.service
                .exchange_token(exchange_command(&redirect.code))
                .await
                .unwrap_err(),
            Error::InvalidUser
        ));
    }

    #[tokio::test]
    async fn confidential_secret_current_and_rotated() {
        let f = fixture().await;

        let redirect = f
            .service
            .generate_auth_code(f.user.id, &authorize_command())
            .await
            .unwrap();
        let mut cmd = exchange_command(&redirect.code);
        cmd.client_secret = Some("client-secret-1".into());
        assert!(f.service.exchange_token(cmd).await.is_ok());

        // Rotate: old secret stays valid inside the grace window.
        let hash = HashService::new(4);
        let mut client = f
            .repos
            .clients
            .find_by_client_id("demo-001-app")
            .await
            .unwrap()
            .unwrap();
        client.client_secret_old_hash = Some(client.client_secret_hash.clone());
        client.client_secret_hash = hash.hash("client-secret-2").unwrap();
        client.secret_old_expires_at = Some(Utc::now() + Duration::hours(24));
        f.repos.clients.update(&client).await.unwrap();

        let redirect = f
            .service
            .generate_auth_code(f.user.id, &authorize_command())
            .await
            .unwrap();
        let mut cmd = exchange_command(&redirect.code);
        cmd.client_secret = Some("client-secret-1".into());
        assert!(f.service.exchange_token(cmd).await.is_ok());

        let redirect = f
            .service
            .generate_auth_code(f.user.id, &authorize_command())
            .await
            .unwrap();
        let mut cmd = exchange_command(&redirect.code);
        cmd.client_secret = Some("wrong-secret".into());
        assert!(matches!(
            f.service.exchange_token(cmd).await.unwrap_err(),
            Error::InvalidClient
        ));
    }

    #[test]
    fn redirect_url_merges_existing_query() {
        let redirect = CodeRedirect {
            code: "abc123".into(),
            state: Some("xyz".into()),
        };
        let url = redirect
            .build_redirect_url("https://app.example/cb?keep=1")
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.origin().ascii_serialization(), "https://app.example");
        assert_eq!(parsed.path(), "/cb");
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("keep".into(), "1".into())));
        assert!(pairs.contains(&("code".into(), "abc123".into())));
        assert!(pairs.contains(&("state".into(), "xyz".into())));
    }

    #[test]
    fn redirect_url_without_state() {
        let redirect = CodeRedirect {
            code: "abc123".into(),
            state: None,
        };
        let url = redirect
            .build_redirect_url("https://app.example/cb")
            .unwrap();
        assert!(url.contains("code=abc123"));
        assert!(!url.contains("state="));
    }
}
