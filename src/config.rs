use std::sync::Arc;

use anyhow::Context;
use url::Url;

use crate::health::{HealthCheck, HealthRegistry};
use crate::repositories::Repositories;
use crate::utils::jwks::JwksService;
use crate::utils::jwt::JwtService;
use crate::utils::keys::KeyProvider;
use crate::utils::password::{HashService, DEFAULT_BCRYPT_ROUNDS};

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => anyhow::bail!("unknown APP_ENV: {other}"),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub env: Environment,
    pub port: u16,
    pub service_name: String,
    /// Absolute base URL, normalized to lowercase scheme/host without a
    /// trailing slash.
    pub service_url: String,

    // JWT
    pub jwt_issuer: String,
    pub jwt_audience: Vec<String>,
    pub jwt_access_token_expires_in_secs: i64,
    pub jwt_key_id: String,

    // OAuth
    pub auth_code_expires_in_minutes: i64,

    // Sessions
    pub session_ttl_secs: i64,

    // Hashing
    pub bcrypt_rounds: u32,

    // Background cleanup
    pub auto_cleanup_interval_ms: u64,

    // CORS
    pub cors_origins: Vec<String>,

    // Logging
    pub log_level: String,
    pub log_requests: bool,

    /// MySQL DSN; absent means the in-memory store.
    pub database_url: Option<String>,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn comma_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    /// Session lifetime when the user asks to be remembered.
    pub const REMEMBER_ME_TTL_SECS: i64 = 30 * 24 * 3600;

    pub fn from_env() -> anyhow::Result<Self> {
        let env = Environment::parse(&env_or("APP_ENV", "development"))?;
        let port: u16 = env_or("PORT", "4000").parse().context("invalid PORT")?;
        let service_url = normalize_service_url(&env_or(
            "SERVICE_URL",
            &format!("http://localhost:{port}"),
        ))?;
        let jwt_issuer = env_or("JWT_ISSUER", &service_url);

        Ok(Self {
            env,
            port,
            service_name: env_or("SERVICE_NAME", "auth-server"),
            jwt_audience: comma_list(&env_or("JWT_AUDIENCE", "")),
            jwt_access_token_expires_in_secs: env_or("JWT_ACCESS_TOKEN_EXPIRES_IN", "900")
                .parse()
                .context("invalid JWT_ACCESS_TOKEN_EXPIRES_IN")?,
            jwt_key_id: env_or("JWT_KEY_ID", "auth-server-key"),
            auth_code_expires_in_minutes: env_or("OAUTH2_AUTH_CODE_EXPIRES_IN", "1")
                .parse::<i64>()
                .context("invalid OAUTH2_AUTH_CODE_EXPIRES_IN")?
                .clamp(1, crate::models::AuthCode::MAX_TTL_MINUTES),
            session_ttl_secs: env_or("SESSION_TTL_SECS", "3600")
                .parse()
                .context("invalid SESSION_TTL_SECS")?,
            bcrypt_rounds: env_or("BCRYPT_ROUNDS", &DEFAULT_BCRYPT_ROUNDS.to_string())
                .parse()
                .context("invalid BCRYPT_ROUNDS")?,
            auto_cleanup_interval_ms: env_or("AUTO_CLEANUP_INTERVAL_MS", "300000")
                .parse()
                .context("invalid AUTO_CLEANUP_INTERVAL_MS")?,
            cors_origins: comma_list(&env_or("CORS_ORIGINS", "")),
            log_level: env_or("LOG_LEVEL", "info"),
            log_requests: env_or("LOG_REQUESTS", "true")
                .parse()
                .unwrap_or(true),
            database_url: std::env::var("DATABASE_URL").ok(),
            jwt_issuer,
            service_url,
        })
    }

    pub fn socket_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

/// Lowercase scheme/host and no trailing slash. The URL must be absolute.
fn normalize_service_url(raw: &str) -> anyhow::Result<String> {
    let url = Url::parse(raw).with_context(|| format!("invalid SERVICE_URL: {raw}"))?;
    anyhow::ensure!(url.has_host(), "SERVICE_URL must be an absolute URL");
    let mut normalized = url.to_string();
    while normalized.ends_with('/') {
        normalized.pop();
    }
    Ok(normalized)
}

/// Shared application state wired once in the composition root.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repos: Repositories,
    pub jwt: JwtService,
    pub jwks: JwksService,
    pub hash: HashService,
    pub health: HealthRegistry,
}

impl AppState {
    pub fn new(
        config: Config,
        repos: Repositories,
        keys: &KeyProvider,
        extra_checks: Vec<Arc<dyn HealthCheck>>,
    ) -> anyhow::Result<Self> {
        let jwt = JwtService::new(
            keys,
            config.jwt_issuer.clone(),
            config.jwt_audience.clone(),
            config.jwt_access_token_expires_in_secs,
        )?;
        let jwks = JwksService::new(keys);
        let hash = HashService::new(config.bcrypt_rounds);

        let mut checks: Vec<Arc<dyn HealthCheck>> = vec![Arc::new(jwks.clone())];
        checks.extend(extra_checks);

        Ok(Self {
            config: Arc::new(config),
            repos,
            jwt,
            jwks,
            hash,
            health: HealthRegistry::new(checks),
        })
    }
}
