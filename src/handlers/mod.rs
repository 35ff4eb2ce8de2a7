pub mod auth;
pub mod client;
pub mod meta;
pub mod oauth;
pub mod user;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppState;
use crate::middleware::{session_auth_middleware, session_auth_or_login_middleware};

/// 302 Found redirect; the OAuth flow uses 302, not axum's default 303/307.
pub(crate) fn redirect_found(location: &str) -> Response {
    let value = HeaderValue::from_str(location)
        .unwrap_or_else(|_| HeaderValue::from_static("/"));
    (StatusCode::FOUND, [(header::LOCATION, value)]).into_response()
}

/// Minimal attribute/text escaping for the server-rendered pages.
pub(crate) fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Assemble the full application router.
///
/// Route groups and their session handling:
/// - public: `/`, `/health`, `/health/deep`, login, register, token, JWKS
/// - interactive (redirect to login): authorize, consent page, decision
/// - API (JSON 401): logout, `/user/me*`, `/client*`
pub fn create_router(state: AppState) -> Router {
    let public_auth_routes = Router::new()
        .route("/login", get(auth::login_page_handler))
        .route("/login", post(auth::login_handler))
        .route("/token", post(oauth::token_handler))
        .route("/.well-known/jwks.json", get(oauth::jwks_handler));

    let interactive_auth_routes = Router::new()
        .route("/authorize", get(oauth::authorize_handler))
        .route("/authorize/consent", get(oauth::consent_page_handler))
        .route("/authorize/decision", post(oauth::decision_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session_auth_or_login_middleware,
        ));

    let protected_auth_routes = Router::new()
        .route("/logout", post(auth::logout_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session_auth_middleware,
        ));

    let user_routes = Router::new()
        .route("/me", get(user::me_handler))
        .route("/me", put(user::update_me_handler))
        .route("/me/password", put(user::update_password_handler))
        .route("/me/consents", get(user::list_consents_handler))
        .route("/me/consents/:client_id", delete(user::revoke_consent_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session_auth_middleware,
        ));

    let client_routes = Router::new()
        .route("/", get(client::list_clients_handler).post(client::create_client_handler))
        .route("/:id", get(client::get_client_handler))
        .route("/:id", put(client::update_client_handler))
        .route("/:id", delete(client::delete_client_handler))
        .route("/:id/rotate-secret", post(client::rotate_secret_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session_auth_middleware,
        ));

    let mut router = Router::new()
        .route("/", get(meta::root_handler))
        .route("/health", get(meta::health_handler))
        .route("/health/deep", get(meta::deep_health_handler))
        .nest("/auth", public_auth_routes)
        .nest("/auth", interactive_auth_routes)
        .nest("/auth", protected_auth_routes)
        .route("/user", post(user::register_handler))
        .nest("/user", user_routes)
        .nest("/client", client_routes);

    if state.config.log_requests {
        router = router.layer(TraceLayer::new_for_http());
    }

    router
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors_layer(&state))
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}
