use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{GrantType, PublicClient};
use crate::services::client::{CreateClient, UpdateClient};

fn parse_grant_types(raw: &[String]) -> Result<Vec<GrantType>> {
    raw.iter()
        .map(|g| {
            GrantType::parse(g)
                .ok_or_else(|| Error::validation(format!("unsupported grant type: {g}")))
        })
        .collect()
}

/// Body of `POST /client`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateClientRequest {
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
}

impl CreateClientRequest {
    pub fn parse(self) -> Result<CreateClient> {
        Ok(CreateClient {
            client_name: self.client_name,
            redirect_uris: self.redirect_uris,
            grant_types: parse_grant_types(&self.grant_types)?,
            is_public: self.is_public,
        })
    }
}

/// Body of `PUT /client/:id`; absent fields stay unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateClientRequest {
    pub client_name: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
    pub grant_types: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

impl UpdateClientRequest {
    pub fn parse(self) -> Result<UpdateClient> {
        let grant_types = self
            .grant_types
            .map(|raw| parse_grant_types(&raw))
            .transpose()?;
        Ok(UpdateClient {
            client_name: self.client_name,
            redirect_uris: self.redirect_uris,
            grant_types,
            is_public: self.is_public,
        })
    }
}

/// Creation response; the only response that ever carries the plaintext
/// secret.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedClientResponse {
    #[serde(flatten)]
    pub client: PublicClient,
    pub client_secret: String,
}

/// Rotation response; carries the fresh plaintext secret exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct RotatedSecretResponse {
    pub client_secret: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_grant_type_is_rejected() {
        let req = CreateClientRequest {
            client_name: "Demo App".into(),
            redirect_uris: vec!["https://app.example/cb".into()],
            grant_types: vec!["implicit".into()],
            is_public: false,
        };
        assert!(req.parse().is_err());
    }

    #[test]
    fn known_grant_types_parse() {
        let req = CreateClientRequest {
            client_name: "Demo App".into(),
            redirect_uris: vec!["https://app.example/cb".into()],
            grant_types: vec!["authorization_code".into(), "refresh_token".into()],
            is_public: false,
        };
        let input = req.parse().unwrap();
        assert_eq!(
            input.grant_types,
            vec![GrantType::AuthorizationCode, GrantType::RefreshToken]
        );
    }
}
