//! Client registration and owner-scoped management.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Client, GrantType, PublicClient};
use crate::repositories::{ClientRepository, Repositories};
use crate::utils::password::HashService;
use crate::utils::secret::{generate_client_id, generate_client_secret};

pub const CLIENT_NAME_MIN: usize = 3;
pub const CLIENT_NAME_MAX: usize = 30;

/// How long a rotated-out secret keeps working.
pub const SECRET_ROTATION_GRACE_HOURS: i64 = 24;

/// Validated input for client creation.
#[derive(Debug, Clone)]
pub struct CreateClient {
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<GrantType>,
    pub is_public: bool,
}

/// Validated input for client updates; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateClient {
    pub client_name: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
    pub grant_types: Option<Vec<GrantType>>,
    pub is_public: Option<bool>,
}

/// Creation result; the plaintext secret appears here exactly once.
#[derive(Debug, Clone)]
pub struct CreatedClient {
    pub client: PublicClient,
    pub client_secret: String,
}

#[derive(Clone)]
pub struct ClientService {
    repos: Repositories,
    hash: HashService,
}

impl ClientService {
    const CREATE_ATTEMPTS: u32 = 3;

    pub fn new(repos: Repositories, hash: HashService) -> Self {
        Self { repos, hash }
    }

    pub async fn create(&self, owner: Uuid, input: CreateClient) -> Result<CreatedClient> {
        validate_client_name(&input.client_name)?;
        validate_redirect_uris(&input.redirect_uris)?;
        let grant_types = if input.grant_types.is_empty() {
            vec![GrantType::AuthorizationCode]
        } else {
            input.grant_types
        };

        let client_secret = generate_client_secret();
        let client_secret_hash = self.hash.hash(&client_secret)?;

        let mut last_err = None;
        for _ in 0..Self::CREATE_ATTEMPTS {
            let now = Utc::now();
            let client = Client {
                id: Uuid::new_v4(),
                client_id: generate_client_id(),
                client_secret_hash: client_secret_hash.clone(),
                client_secret_old_hash: None,
                secret_old_expires_at: None,
                client_name: input.client_name.clone(),
                redirect_uris: input.redirect_uris.clone(),
                grant_types: grant_types.clone(),
                is_public: input.is_public,
                is_active: true,
                user_id: owner,
                created_at: now,
                updated_at: now,
            };
            match self.repos.clients.create(&client).await {
                Ok(()) => {
                    tracing::info!(client_id = %client.client_id, owner = %owner, "client registered");
                    return Ok(CreatedClient {
                        client: client.to_public(),
                        client_secret,
                    });
                }
                Err(Error::Conflict(_)) => {
                    last_err = Some(Error::Conflict("client_id collision".to_string()));
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| Error::ServerError(anyhow::anyhow!("client creation failed"))))
    }

    /// Active clients owned by the caller, newest first.
    pub async fn list(&self, owner: Uuid) -> Result<Vec<PublicClient>> {
        let clients = self.repos.clients.list_active_by_owner(owner).await?;
        Ok(clients.iter().map(Client::to_public).collect())
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<PublicClient> {
        Ok(self.owned_client(owner, id).await?.to_public())
    }

    pub async fn update(&self, owner: Uuid, id: Uuid, input: UpdateClient) -> Result<PublicClient> {
        let mut client = self.owned_client(owner, id).await?;

        if let Some(name) = input.client_name {
            validate_client_name(&name)?;
            client.client_name = name;
        }
        if let Some(uris) = input.redirect_uris {
            validate_redirect_uris(&uris)?;
            client.redirect_uris = uris;
        }
        if let Some(grants) = input.grant_types {
            client.grant_types = grants;
        }
        if let Some(is_public) = input.is_public {
            client.is_public = is_public;
        }
        client.updated_at = Utc::now();

        self.repos.clients.update(&client).await?;
        Ok(client.to_public())
    }

    /// Soft delete: the row stays addressable by id for recovery and audit.
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<()> {
        let mut client = self.owned_client(owner, id).await?;
        client.is_active = false;
        client.updated_at = Utc::now();
        self.repos.clients.update(&client).await?;
        tracing::info!(client_id = %client.client_id, "client soft-deleted");
        Ok(())
    }

    /// Replace the secret; the previous one keeps working for the grace
    /// window. The plaintext is returned exactly once.
    pub async fn rotate_secret(&self, owner: Uuid, id: Uuid) -> Result<String> {
        let mut client = self.owned_client(owner, id).await?;

        let new_secret = generate_client_secret();
        let new_hash = self.hash.hash(&new_secret)?;

        client.client_secret_old_hash = Some(std::mem::replace(
            &mut client.client_secret_hash,
            new_hash,
        ));
        client.secret_old_expires_at =
            Some(Utc::now() + Duration::hours(SECRET_ROTATION_GRACE_HOURS));
        client.updated_at = Utc::now();

        self.repos.clients.update(&client).await?;
        tracing::info!(client_id = %client.client_id, "client secret rotated");
        Ok(new_secret)
    }

    async fn owned_client(&self, owner: Uuid, id: Uuid) -> Result<Client> {
        let client = self
            .repos
            .clients
            .find_by_id(id)
            .await?
            .ok_or(Error::NotFound("Client"))?;
        if !client.is_owned_by(owner) {
            return Err(Error::Forbidden);
        }
        Ok(client)
    }
}

fn validate_client_name(name: &str) -> Result<()> {
    let len = name.trim().chars().count();
    if !(CLIENT_NAME_MIN..=CLIENT_NAME_MAX).contains(&len) {
        return Err(Error::validation(format!(
            "client_name must be between {CLIENT_NAME_MIN} and {CLIENT_NAME_MAX} characters"
        )));
    }
    Ok(())
}

fn validate_redirect_uris(uris: &[String]) -> Result<()> {
    if uris.is_empty() {
        return Err(Error::validation("redirect_uris must not be empty"));
    }
    for uri in uris {
        if !Client::redirect_uri_allowed(uri) {
            return Err(Error::validation(format!(
                "redirect URI must be absolute HTTPS or localhost HTTP: {uri}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ClientService {
        ClientService::new(Repositories::in_memory(), HashService::new(4))
    }

    fn create_input() -> CreateClient {
        CreateClient {
            client_name: "Demo App".into(),
            redirect_uris: vec!["https://app.example/cb".into()],
            grant_types: vec![],
            is_public: true,
        }
    }

    #[tokio::test]
    async fn create_returns_plaintext_secret_once() {
        let svc = service();
        let created = svc.create(Uuid::new_v4(), create_input()).await.unwrap();
        assert_eq!(created.client.client_name, "Demo App");
        assert_eq!(created.client.grant_types, vec![GrantType::AuthorizationCode]);
        assert!(!created.client_secret.is_empty());

        // The stored record carries only the hash.
        let stored = svc
            .repos
            .clients
            .find_by_id(created.client.id)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.client_secret_hash, created.client_secret);
        assert!(HashService::new(4)
            .verify(&created.client_secret, &stored.client_secret_hash)
            .unwrap());
    }

    #[tokio::test]
    async fn create_rejects_bad_inputs() {
        let svc = service();
        let owner = Uuid::new_v4();

        let mut input = create_input();
        input.client_name = "ab".into();
        assert!(svc.create(owner, input).await.is_err());

        let mut input = create_input();
        input.redirect_uris = vec![];
        assert!(svc.create(owner, input).await.is_err());

        let mut input = create_input();
        input.redirect_uris = vec!["http://app.example/cb".into()];
        assert!(svc.create(owner, input).await.is_err());
    }

    #[tokio::test]
    async fn listing_is_owner_scoped_and_newest_first() {
        let svc = service();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        let first = svc.create(owner, create_input()).await.unwrap();
        let mut second_input = create_input();
        second_input.client_name = "Second App".into();
        let second = svc.create(owner, second_input).await.unwrap();
        svc.create(other, create_input()).await.unwrap();

        let listed = svc.list(owner).await.unwrap();
        assert_eq!(listed.len(), 2);
        let ids: Vec<Uuid> = listed.iter().map(|c| c.id).collect();
        assert!(ids.contains(&first.client.id));
        assert!(ids.contains(&second.client.id));
    }

    #[tokio::test]
    async fn non_owner_is_forbidden() {
        let svc = service();
        let owner = Uuid::new_v4();
        let created = svc.create(owner, create_input()).await.unwrap();

        let intruder = Uuid::new_v4();
        assert!(matches!(
            svc.get(intruder, created.client.id).await.unwrap_err(),
            Error::Forbidden
        ));
        assert!(matches!(
            svc.delete(intruder, created.client.id).await.unwrap_err(),
            Error::Forbidden
        ));
        assert!(matches!(
            svc.rotate_secret(intruder, created.client.id)
                .await
                .unwrap_err(),
            Error::Forbidden
        ));
    }

    #[tokio::test]
    async fn soft_delete_hides_from_listing_but_not_get() {
        let svc = service();
        let owner = Uuid::new_v4();
        let created = svc.create(owner, create_input()).await.unwrap();

        svc.delete(owner, created.client.id).await.unwrap();
        assert!(svc.list(owner).await.unwrap().is_empty());

        let fetched = svc.get(owner, created.client.id).await.unwrap();
        assert!(!fetched.is_active);
    }

    #[tokio::test]
    async fn update_changes_only_provided_fields() {
        let svc = service();
        let owner = Uuid::new_v4();
        let created = svc.create(owner, create_input()).await.unwrap();

        let updated = svc
            .update(
                owner,
                created.client.id,
                UpdateClient {
                    client_name: Some("Renamed App".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.client_name, "Renamed App");
        assert_eq!(updated.redirect_uris, created.client.redirect_uris);
    }

    #[tokio::test]
    async fn rotation_keeps_old_secret_for_grace_window() {
        let svc = service();
        let hash = HashService::new(4);
        let owner = Uuid::new_v4();
        let created = svc.create(owner, create_input()).await.unwrap();
        let old_secret = created.client_secret.clone();

        let new_secret = svc.rotate_secret(owner, created.client.id).await.unwrap();
        assert_ne!(new_secret, old_secret);

        let stored = svc
            .repos
            .clients
            .find_by_id(created.client.id)
            .await
            .unwrap()
            .unwrap();
        assert!(hash.verify(&new_secret, &stored.client_secret_hash).unwrap());
        assert!(hash
            .verify(&old_secret, stored.client_secret_old_hash.as_ref().unwrap())
            .unwrap());
        assert!(stored.old_secret_valid(Utc::now()));
    }
}
