use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;
use uuid::Uuid;

/// Grant types a client may be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
}

impl GrantType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "authorization_code" => Some(Self::AuthorizationCode),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// A registered OAuth client application.
///
/// Ownership (`user_id`) is immutable after creation. Both secret hashes are
/// skipped on serialization; `client_secret_old_hash` stays valid only while
/// `secret_old_expires_at > now` after a rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret_hash: String,
    #[serde(skip_serializing)]
    pub client_secret_old_hash: Option<String>,
    pub secret_old_expires_at: Option<DateTime<Utc>>,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<GrantType>,
    pub is_public: bool,
    pub is_active: bool,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Exact string match against the registered list; no normalization.
    pub fn is_valid_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }

    pub fn supports_grant_type(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    /// Whether the previous secret is still inside its rotation grace window.
    pub fn old_secret_valid(&self, now: DateTime<Utc>) -> bool {
        self.client_secret_old_hash.is_some()
            && self.secret_old_expires_at.map_or(false, |at| at > now)
    }

    /// Projection safe for API responses: omits both secret hashes.
    pub fn to_public(&self) -> PublicClient {
        PublicClient {
            id: self.id,
            client_id: self.client_id.clone(),
            client_name: self.client_name.clone(),
            redirect_uris: self.redirect_uris.clone(),
            grant_types: self.grant_types.clone(),
            is_public: self.is_public,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Shape check for URIs at registration and authorize time: absolute,
    /// HTTPS, or plain HTTP only for localhost.
    pub fn redirect_uri_allowed(uri: &str) -> bool {
        let Ok(parsed) = Url::parse(uri) else {
            return false;
        };
        match parsed.scheme() {
            "https" => true,
            "http" => matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1")),
            _ => false,
        }
    }
}

/// Secret-free client projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicClient {
    pub id: Uuid,
    pub client_id: String,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<GrantType>,
    pub is_public: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row type for MySQL query results.
#[derive(Debug, Clone, FromRow)]
pub struct ClientRow {
    pub id: String,
    pub client_id: String,
    pub client_secret_hash: String,
    pub client_secret_old_hash: Option<String>,
    pub secret_old_expires_at: Option<DateTime<Utc>>,
    pub client_name: String,
    pub redirect_uris: serde_json::Value,
    pub grant_types: serde_json::Value,
    pub is_public: bool,
    pub is_active: bool,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ClientRow> for Client {
    fn from(row: ClientRow) -> Self {
        let redirect_uris: Vec<String> =
            serde_json::from_value(row.redirect_uris).unwrap_or_default();
        let grant_types: Vec<GrantType> =
            serde_json::from_value(row.grant_types).unwrap_or_default();
        Self {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            client_id: row.client_id,
            client_secret_hash: row.client_secret_hash,
            client_secret_old_hash: row.client_secret_old_hash,
            secret_old_expires_at: row.secret_old_expires_at,
            client_name: row.client_name,
            redirect_uris,
            grant_types,
            is_public: row.is_public,
            is_active: row.is_active,
            user_id: Uuid::parse_str(&row.user_id).unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> for Client {
    fn from_row(row: &'r sqlx::mysql::MySqlRow) -> Result<Self, sqlx::Error> {
        let client_row = ClientRow::from_row(row)?;
        Ok(Client::from(client_row))
    }
}
