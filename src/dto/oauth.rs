//! Boundary DTOs for the OAuth endpoints. Raw query/body shapes parse into
//! validated commands; the validated types are what the services accept.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Client, ClientId, CodeChallenge, CodeVerifier};
use crate::services::oauth::{AuthorizeCommand, ExchangeCommand};

pub const STATE_MAX_LENGTH: usize = 500;

/// Exact challenge length required at the authorize boundary (base64url of
/// a SHA-256 digest).
pub const CHALLENGE_EXACT_LENGTH: usize = 43;

/// Raw query of `GET /auth/authorize` (and the consent page / decision
/// resubmission). Every field is optional here so missing parameters fail
/// with a message naming the parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeQuery {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub state: Option<String>,
    pub scope: Option<String>,
}

impl AuthorizeQuery {
    pub fn parse(self) -> Result<AuthorizeCommand> {
        let response_type = self
            .response_type
            .ok_or_else(|| Error::validation("response_type is required"))?;
        if response_type != "code" {
            return Err(Error::validation("response_type must be code"));
        }

        let client_id = self
            .client_id
            .ok_or_else(|| Error::validation("client_id is required"))?;
        let client_id = ClientId::parse(&client_id)?;

        let redirect_uri = self
            .redirect_uri
            .ok_or_else(|| Error::validation("redirect_uri is required"))?;
        if !Client::redirect_uri_allowed(&redirect_uri) {
            return Err(Error::validation(
                "redirect_uri must be an absolute HTTPS URL or localhost HTTP",
            ));
        }

        let challenge = self
            .code_challenge
            .ok_or_else(|| Error::validation("code_challenge is required"))?;
        if challenge.len() != CHALLENGE_EXACT_LENGTH {
            return Err(Error::validation(format!(
                "code_challenge must be exactly {CHALLENGE_EXACT_LENGTH} characters"
            )));
        }
        let method = self.code_challenge_method.unwrap_or_else(|| "S256".into());
        let code_challenge = CodeChallenge::parse(&challenge, &method)?;

        if let Some(state) = &self.state {
            if state.chars().count() > STATE_MAX_LENGTH {
                return Err(Error::validation(format!(
                    "state must be at most {STATE_MAX_LENGTH} characters"
                )));
            }
        }

        Ok(AuthorizeCommand {
            client_id,
            redirect_uri,
            code_challenge,
            scope: self.scope.filter(|s| !s.trim().is_empty()),
            state: self.state,
        })
    }
}

/// Rebuild the canonical query string for a validated authorize request,
/// used when bouncing the user through the consent page.
pub fn authorize_query_string(command: &AuthorizeCommand) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    serializer
        .append_pair("response_type", "code")
        .append_pair("client_id", command.client_id.as_str())
        .append_pair("redirect_uri", &command.redirect_uri)
        .append_pair("code_challenge", command.code_challenge.challenge())
        .append_pair(
            "code_challenge_method",
            command.code_challenge.method().as_str(),
        );
    if let Some(scope) = &command.scope {
        serializer.append_pair("scope", scope);
    }
    if let Some(state) = &command.state {
        serializer.append_pair("state", state);
    }
    serializer.finish()
}

/// Signal returned by `GET /auth/authorize` when a consent step is needed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRequiredResponse {
    pub consent_url: String,
    pub scopes: Vec<String>,
}

/// Form body of `POST /auth/authorize/decision`: the decision plus the
/// original authorize parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionForm {
    pub decision: Option<String>,
    #[serde(flatten)]
    pub request: AuthorizeQuery,
}

impl DecisionForm {
    pub fn parse(self) -> Result<(String, AuthorizeCommand)> {
        let decision = self
            .decision
            .ok_or_else(|| Error::validation("decision is required"))?;
        let command = self.request.parse()?;
        Ok((decision, command))
    }
}

/// Form body of `POST /auth/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequestForm {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub code_verifier: Option<String>,
}

impl TokenRequestForm {
    pub fn parse(self) -> Result<ExchangeCommand> {
        let grant_type = self
            .grant_type
            .ok_or_else(|| Error::validation("grant_type is required"))?;
        if grant_type != "authorization_code" {
            return Err(Error::validation(
                "grant_type must be authorization_code",
            ));
        }

        let code = self
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::validation("code is required"))?;
        let redirect_uri = self
            .redirect_uri
            .ok_or_else(|| Error::validation("redirect_uri is required"))?;
        let client_id = self
            .client_id
            .ok_or_else(|| Error::validation("client_id is required"))?;
        let client_id = ClientId::parse(&client_id)?;
        let verifier = self
            .code_verifier
            .ok_or_else(|| Error::validation("code_verifier is required"))?;
        let code_verifier = CodeVerifier::parse(&verifier)?;

        Ok(ExchangeCommand {
            code,
            client_id,
            redirect_uri,
            code_verifier,
            client_secret: self.client_secret,
        })
    }
}
