//! Cookie-based session validation for protected routes.
//!
//! Two variants share the same resolution logic and differ only in how a
//! bad session is answered: API routes get a JSON 401, the interactive
//! authorize surface gets a 302 to the login page carrying a `return_url`.
//! The variant is chosen per route, not per error.

use axum::{
    extract::{OriginalUri, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use uuid::Uuid;

use crate::config::AppState;
use crate::error::{Error, Result};
use crate::handlers::redirect_found;
use crate::models::Session;
use crate::repositories::SessionRepository;

/// Name of the browser session cookie.
pub const SESSION_COOKIE: &str = "session_id";

/// Caller identity attached to the request after validation.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: Uuid,
    pub session_id: String,
}

impl AuthSession {
    /// Truncated id for log lines; never log the full session id.
    pub fn short_id(&self) -> &str {
        &self.session_id[..self.session_id.len().min(8)]
    }
}

enum Rejection {
    NoCookie,
    NotFound,
    Expired,
}

impl Rejection {
    fn reason(&self) -> &'static str {
        match self {
            Rejection::NoCookie => "no-cookie",
            Rejection::NotFound => "not-found",
            Rejection::Expired => "expired",
        }
    }
}

async fn resolve_session(state: &AppState, jar: &CookieJar) -> Result<Session, Rejection> {
    let cookie = jar.get(SESSION_COOKIE).ok_or(Rejection::NoCookie)?;
    let session = state
        .repos
        .sessions
        .find_by_id(cookie.value())
        .await
        .map_err(|_| Rejection::NotFound)?
        .ok_or(Rejection::NotFound)?;
    if session.is_expired() {
        return Err(Rejection::Expired);
    }
    Ok(session)
}

fn attach(request: &mut Request, session: Session) {
    let auth = AuthSession {
        user_id: session.user_id,
        session_id: session.id,
    };
    tracing::debug!(session = auth.short_id(), user_id = %auth.user_id, "session validated");
    request.extensions_mut().insert(auth);
}

/// JSON-401 variant for API routes.
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    match resolve_session(&state, &jar).await {
        Ok(session) => {
            attach(&mut request, session);
            Ok(next.run(request).await)
        }
        Err(rejection) => {
            tracing::debug!(reason = rejection.reason(), "session rejected");
            Err(Error::InvalidSession)
        }
    }
}

/// Redirect-to-login variant for the interactive authorize surface. A stale
/// cookie is cleared on the way out.
pub async fn session_auth_or_login_middleware(
    State(state): State<AppState>,
    OriginalUri(original_uri): OriginalUri,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve_session(&state, &jar).await {
        Ok(session) => {
            attach(&mut request, session);
            next.run(request).await
        }
        Err(rejection) => {
            tracing::debug!(reason = rejection.reason(), "redirecting to login");
            let return_url = urlencoding::encode(&original_uri.to_string()).into_owned();
            let target = format!("/auth/login?return_url={return_url}");
            let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
            (jar, redirect_found(&target)).into_response()
        }
    }
}
