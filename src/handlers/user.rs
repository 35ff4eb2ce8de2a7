use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::config::AppState;
use crate::dto::user::{
    RegisterRequest, UpdatePasswordRequest, UpdateUserRequest, UserResponse,
};
use crate::error::Result;
use crate::middleware::AuthSession;
use crate::services::user::ConsentInfo;
use crate::services::UserService;

fn user_service(state: &AppState) -> UserService {
    UserService::new(state.repos.clone(), state.hash.clone())
}

/// POST /user - register a new account.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let user = user_service(&state).register(request.into()).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /user/me - fetch the authenticated user.
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(auth_session): Extension<AuthSession>,
) -> Result<Json<UserResponse>> {
    let user = user_service(&state).fetch(auth_session.user_id).await?;
    Ok(Json(user.into()))
}

/// PUT /user/me - update profile fields.
pub async fn update_me_handler(
    State(state): State<AppState>,
    Extension(auth_session): Extension<AuthSession>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    let user = user_service(&state)
        .update(auth_session.user_id, request.into())
        .await?;
    Ok(Json(user.into()))
}

/// PUT /user/me/password - change the password.
pub async fn update_password_handler(
    State(state): State<AppState>,
    Extension(auth_session): Extension<AuthSession>,
    Json(request): Json<UpdatePasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    user_service(&state)
        .update_password(
            auth_session.user_id,
            &request.current_password,
            &request.new_password,
        )
        .await?;
    Ok(Json(serde_json::json!({ "message": "password updated" })))
}

/// GET /user/me/consents - list granted consents.
pub async fn list_consents_handler(
    State(state): State<AppState>,
    Extension(auth_session): Extension<AuthSession>,
) -> Result<Json<Vec<ConsentInfo>>> {
    let consents = user_service(&state)
        .list_consents(auth_session.user_id)
        .await?;
    Ok(Json(consents))
}

/// DELETE /user/me/consents/:client_id - revoke a granted consent.
pub async fn revoke_consent_handler(
    State(state): State<AppState>,
    Extension(auth_session): Extension<AuthSession>,
    Path(client_id): Path<String>,
) -> Result<StatusCode> {
    user_service(&state)
        .revoke_consent(auth_session.user_id, &client_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
