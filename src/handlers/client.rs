use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use crate::config::AppState;
use crate::dto::client::{
    CreateClientRequest, CreatedClientResponse, RotatedSecretResponse, UpdateClientRequest,
};
use crate::error::Result;
use crate::middleware::AuthSession;
use crate::models::PublicClient;
use crate::services::ClientService;

fn client_service(state: &AppState) -> ClientService {
    ClientService::new(state.repos.clone(), state.hash.clone())
}

/// POST /client - register a client; the plaintext secret appears only in
/// this response.
pub async fn create_client_handler(
    State(state): State<AppState>,
    Extension(auth_session): Extension<AuthSession>,
    Json(request): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<CreatedClientResponse>)> {
    let created = client_service(&state)
        .create(auth_session.user_id, request.parse()?)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedClientResponse {
            client: created.client,
            client_secret: created.client_secret,
        }),
    ))
}

/// GET /client - list the caller's active clients.
pub async fn list_clients_handler(
    State(state): State<AppState>,
    Extension(auth_session): Extension<AuthSession>,
) -> Result<Json<Vec<PublicClient>>> {
    let clients = client_service(&state).list(auth_session.user_id).await?;
    Ok(Json(clients))
}

/// GET /client/:id.
pub async fn get_client_handler(
    State(state): State<AppState>,
    Extension(auth_session): Extension<AuthSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicClient>> {
    let client = client_service(&state).get(auth_session.user_id, id).await?;
    Ok(Json(client))
}

/// PUT /client/:id.
pub async fn update_client_handler(
    State(state): State<AppState>,
    Extension(auth_session): Extension<AuthSession>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateClientRequest>,
) -> Result<Json<PublicClient>> {
    let client = client_service(&state)
        .update(auth_session.user_id, id, request.parse()?)
        .await?;
    Ok(Json(client))
}

/// DELETE /client/:id - soft delete.
pub async fn delete_client_handler(
    State(state): State<AppState>,
    Extension(auth_session): Extension<AuthSession>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    client_service(&state)
        .delete(auth_session.user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /client/:id/rotate-secret - the fresh plaintext secret appears only
/// in this response.
pub async fn rotate_secret_handler(
    State(state): State<AppState>,
    Extension(auth_session): Extension<AuthSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<RotatedSecretResponse>> {
    let client_secret = client_service(&state)
        .rotate_secret(auth_session.user_id, id)
        .await?;
    Ok(Json(RotatedSecretResponse { client_secret }))
}
