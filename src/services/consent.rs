//! Consent capture and reuse: the gate between an authenticated authorize
//! request and code issuance.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Consent;
use crate::repositories::{ClientRepository, ConsentRepository, Repositories};
use crate::services::oauth::AuthorizeCommand;

/// Scopes granted when an approval carries none.
pub const DEFAULT_SCOPES: &[&str] = &["read"];

/// Human-readable descriptions for well-known scopes.
const SCOPE_DESCRIPTIONS: &[(&str, &str)] = &[
    ("openid", "Confirm your identity"),
    ("profile", "View your profile information"),
    ("email", "View your email address"),
    ("read", "Read your data"),
    ("write", "Modify your data"),
];

/// Description for a scope name, falling back to a generic line for scopes
/// outside the catalog.
pub fn describe_scope(name: &str) -> String {
    SCOPE_DESCRIPTIONS
        .iter()
        .find(|(scope, _)| *scope == name)
        .map(|(_, description)| description.to_string())
        .unwrap_or_else(|| format!("Access to scope: {name}"))
}

/// One catalog entry on the consent page.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeDisplay {
    pub name: String,
    pub description: String,
}

/// Everything the consent page renderer needs: the client's display name,
/// the scope catalog, and the original request parameters to resubmit with
/// the decision.
#[derive(Debug, Clone)]
pub struct ConsentPage {
    pub client_name: String,
    pub scopes: Vec<ScopeDisplay>,
    pub request: AuthorizeCommand,
}

#[derive(Clone)]
pub struct ConsentService {
    repos: Repositories,
}

impl ConsentService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// True iff an active consent for `(user, client)` exists and its scope
    /// set covers every requested scope.
    pub async fn check_consent(
        &self,
        user_id: Uuid,
        client_id: &str,
        requested_scopes: &[String],
    ) -> Result<bool> {
        let consent = self
            .repos
            .consents
            .find_by_user_and_client(user_id, client_id)
            .await?;
        Ok(match consent {
            Some(c) => c.is_active() && c.has_all_scopes(requested_scopes),
            None => false,
        })
    }

    /// Assemble the pre-render data for the consent page. No persistence.
    pub async fn show_consent(&self, request: AuthorizeCommand) -> Result<ConsentPage> {
        let client = self
            .repos
            .clients
            .find_by_client_id(request.client_id.as_str())
            .await?
            .ok_or(Error::InvalidClient)?;

        let mut scopes = request.scopes();
        if scopes.is_empty() {
            scopes = DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect();
        }
        let scopes = scopes
            .into_iter()
            .map(|name| ScopeDisplay {
                description: describe_scope(&name),
                name,
            })
            .collect();

        Ok(ConsentPage {
            client_name: client.client_name,
            scopes,
            request,
        })
    }

    /// Apply the user's decision. Denial fails the flow; approval upserts
    /// the `(user, client)` consent row, replacing any previous scope set.
    pub async fn process_consent(
        &self,
        user_id: Uuid,
        decision: &str,
        request: &AuthorizeCommand,
    ) -> Result<Consent> {
        match decision {
            "approve" => {
                let mut scopes = request.scopes();
                if scopes.is_empty() {
                    scopes = DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect();
                }
                let consent = self
                    .repos
                    .consents
                    .upsert(user_id, request.client_id.as_str(), &scopes)
                    .await?;
                tracing::info!(
                    user_id = %user_id,
                    client_id = %request.client_id,
                    scopes = ?consent.scopes,
                    "consent granted"
                );
                Ok(consent)
            }
            "deny" => {
                tracing::info!(
                    user_id = %user_id,
                    client_id = %request.client_id,
                    "consent denied"
                );
                Err(Error::DenyConsent)
            }
            _ => Err(Error::validation("decision must be approve or deny")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::{Client, ClientId, CodeChallenge, GrantType};
    use crate::repositories::{ClientRepository, ConsentRepository};

    async fn fixture() -> (ConsentService, Repositories) {
        let repos = Repositories::in_memory();
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
        repos.clients.create(&client).await.unwrap();
        (ConsentService::new(repos.clone()), repos)
    }

    fn request(scope: Option<&str>) -> AuthorizeCommand {
        AuthorizeCommand {
            client_id: ClientId::parse("demo-001-app").unwrap(),
            redirect_uri: "https://app.example/cb".into(),
            code_challenge: CodeChallenge::parse(
                "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM",
                "S256",
            )
            .unwrap(),
            scope: scope.map(String::from),
            state: None,
        }
    }

    #[tokio::test]
    async fn no_consent_row_means_not_covered() {
        let (svc, _) = fixture().await;
        assert!(!svc
            .check_consent(Uuid::new_v4(), "demo-001-app", &["read".into()])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn approval_covers_subsequent_requests() {
        let (svc, _) = fixture().await;
        let user_id = Uuid::new_v4();

        svc.process_consent(user_id, "approve", &request(Some("read")))
            .await
            .unwrap();

        assert!(svc
            .check_consent(user_id, "demo-001-app", &["read".into()])
            .await
            .unwrap());
        // Escalation beyond the granted set is not covered.
        assert!(!svc
            .check_consent(user_id, "demo-001-app", &["read".into(), "write".into()])
            .await
            .unwrap());
        // An empty request is covered by any active consent.
        assert!(svc
            .check_consent(user_id, "demo-001-app", &[])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn reapproval_replaces_the_scope_set() {
        let (svc, _) = fixture().await;
        let user_id = Uuid::new_v4();

        svc.process_consent(user_id, "approve", &request(Some("read write")))
            .await
            .unwrap();
        let consent = svc
            .process_consent(user_id, "approve", &request(Some("read")))
            .await
            .unwrap();
        assert_eq!(consent.scopes, vec!["read"]);
        assert!(!svc
            .check_consent(user_id, "demo-001-app", &["write".into()])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn missing_scope_defaults_to_read() {
        let (svc, _) = fixture().await;
        let consent = svc
            .process_consent(Uuid::new_v4(), "approve", &request(None))
            .await
            .unwrap();
        assert_eq!(consent.scopes, vec!["read"]);
    }

    #[tokio::test]
    async fn denial_fails_the_flow() {
        let (svc, _) = fixture().await;
        assert!(matches!(
            svc.process_consent(Uuid::new_v4(), "deny", &request(Some("read")))
                .await
                .unwrap_err(),
            Error::DenyConsent
        ));
    }

    #[tokio::test]
    async fn revoked_consent_no_longer_covers() {
        let (svc, repos) = fixture().await;
        let user_id = Uuid::new_v4();
        svc.process_consent(user_id, "approve", &request(Some("read")))
            .await
            .unwrap();
        repos.consents.revoke(user_id, "demo-001-app").await.unwrap();
        assert!(!svc
            .check_consent(user_id, "demo-001-app", &["read".into()])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn consent_page_catalogs_scopes() {
        let (svc, _) = fixture().await;
        let page = svc
            .show_consent(request(Some("read custom:thing")))
            .await
            .unwrap();
        assert_eq!(page.client_name, "Demo App");
        assert_eq!(page.scopes.len(), 2);
        assert_eq!(page.scopes[0].description, "Read your data");
        assert_eq!(
            page.scopes[1].description,
            "Access to scope: custom:thing"
        );
    }

    #[test]
    fn scope_catalog_fallback() {
        assert_eq!(describe_scope("write"), "Modify your data");
        assert_eq!(describe_scope("foo"), "Access to scope: foo");
    }
}
