use axum::{
    extract::{Query, State},
    http::{header::USER_AGENT, HeaderMap},
    response::{Html, IntoResponse, Response},
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;

use crate::config::AppState;
use crate::dto::auth::{LoginRequest, LoginResponse};
use crate::dto::JsonOrForm;
use crate::error::Result;
use crate::handlers::{escape_html, redirect_found};
use crate::middleware::{AuthSession, SESSION_COOKIE};
use crate::services::{AuthService, SessionService};

#[derive(Debug, Deserialize)]
pub struct LoginPageQuery {
    pub return_url: Option<String>,
}

/// GET /auth/login - render the login form.
pub async fn login_page_handler(Query(query): Query<LoginPageQuery>) -> Html<String> {
    let return_url_field = query
        .return_url
        .map(|url| {
            format!(
                r#"<input type="hidden" name="return_url" value="{}">"#,
                escape_html(&url)
            )
        })
        .unwrap_or_default();

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Sign in</title></head>
<body>
  <h1>Sign in</h1>
  <form method="post" action="/auth/login">
    {return_url_field}
    <label>Email or username <input type="text" name="email_or_username" autocomplete="username"></label>
    <label>Password <input type="password" name="password" autocomplete="current-password"></label>
    <label><input type="checkbox" name="remember_me" value="true"> Remember me</label>
    <button type="submit">Sign in</button>
  </form>
</body>
</html>"#
    ))
}

/// POST /auth/login - verify credentials and establish a session.
///
/// Browser form posts with a `return_url` are answered with a 302 back into
/// the flow they came from; API clients get the user as JSON. Either way the
/// session cookie is set.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    JsonOrForm(request): JsonOrForm<LoginRequest>,
) -> Result<Response> {
    request.validate()?;

    let auth = AuthService::new(state.repos.clone(), state.hash.clone());
    let user = auth.login(&request.email_or_username, &request.password).await?;

    let sessions = SessionService::new(
        state.repos.clone(),
        state.config.session_ttl_secs,
        crate::config::Config::REMEMBER_ME_TTL_SECS,
    );
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    let session = sessions
        .create(user.id, request.remember_me, user_agent, None)
        .await?;

    let max_age = sessions.ttl_secs(request.remember_me);
    let cookie = Cookie::build((SESSION_COOKIE, session.id.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.env.is_production())
        .max_age(time::Duration::seconds(max_age))
        .build();
    let jar = jar.add(cookie);

    match request.safe_return_url() {
        Some(url) => Ok((jar, redirect_found(url)).into_response()),
        None => Ok((
            jar,
            Json(LoginResponse {
                user: user.into(),
            }),
        )
            .into_response()),
    }
}

/// POST /auth/logout - drop the session and clear the cookie.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(auth_session): Extension<AuthSession>,
    jar: CookieJar,
) -> Result<Response> {
    let sessions = SessionService::new(
        state.repos.clone(),
        state.config.session_ttl_secs,
        crate::config::Config::REMEMBER_ME_TTL_SECS,
    );
    sessions.delete(&auth_session.session_id).await?;

    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    Ok((
        jar,
        Json(serde_json::json!({ "message": "signed out" })),
    )
        .into_response())
}
