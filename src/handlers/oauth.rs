use axum::{
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse, Response},
    Extension, Form, Json,
};

use crate::config::AppState;
use crate::dto::oauth::{
    authorize_query_string, AuthorizeQuery, ConsentRequiredResponse, DecisionForm,
    TokenRequestForm,
};
use crate::error::Result;
use crate::handlers::{escape_html, redirect_found};
use crate::middleware::AuthSession;
use crate::models::GrantType;
use crate::services::consent::DEFAULT_SCOPES;
use crate::services::{ConsentService, OAuthService};

fn oauth_service(state: &AppState) -> OAuthService {
    OAuthService::new(
        state.repos.clone(),
        state.jwt.clone(),
        state.hash.clone(),
        state.config.auth_code_expires_in_minutes,
    )
}

/// GET /auth/authorize - start of the authorize state machine for an
/// authenticated user.
///
/// With an active covering consent the response is a 302 back to the client
/// carrying a fresh code; otherwise a consent-required signal pointing at
/// the consent page.
pub async fn authorize_handler(
    State(state): State<AppState>,
    Extension(auth_session): Extension<AuthSession>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response> {
    let command = query.parse()?;

    let oauth = oauth_service(&state);
    oauth
        .validate_client(
            &command.client_id,
            &command.redirect_uri,
            GrantType::AuthorizationCode,
        )
        .await?;

    let consent = ConsentService::new(state.repos.clone());
    let requested = command.scopes();
    let covered = consent
        .check_consent(auth_session.user_id, command.client_id.as_str(), &requested)
        .await?;

    if covered {
        let redirect = oauth
            .generate_auth_code(auth_session.user_id, &command)
            .await?;
        let location = redirect.build_redirect_url(&command.redirect_uri)?;
        return Ok(redirect_found(&location));
    }

    let consent_url = format!(
        "{}/auth/authorize/consent?{}",
        state.config.service_url,
        authorize_query_string(&command)
    );
    let scopes = if requested.is_empty() {
        DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
    } else {
        requested
    };
    Ok(Json(ConsentRequiredResponse { consent_url, scopes }).into_response())
}

/// GET /auth/authorize/consent - render the consent page.
pub async fn consent_page_handler(
    State(state): State<AppState>,
    Extension(_auth_session): Extension<AuthSession>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Html<String>> {
    let command = query.parse()?;

    let oauth = oauth_service(&state);
    oauth
        .validate_client(
            &command.client_id,
            &command.redirect_uri,
            GrantType::AuthorizationCode,
        )
        .await?;

    let consent = ConsentService::new(state.repos.clone());
    let page = consent.show_consent(command).await?;

    let scope_items: String = page
        .scopes
        .iter()
        .map(|scope| {
            format!(
                "    <li><strong>{}</strong>: {}</li>\n",
                escape_html(&scope.name),
                escape_html(&scope.description)
            )
        })
        .collect();

    let hidden_fields: String = [
        ("response_type", "code".to_string()),
        ("client_id", page.request.client_id.as_str().to_string()),
        ("redirect_uri", page.request.redirect_uri.clone()),
        (
            "code_challenge",
            page.request.code_challenge.challenge().to_string(),
        ),
        (
            "code_challenge_method",
            page.request.code_challenge.method().as_str().to_string(),
        ),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .chain(
        page.request
            .scope
            .clone()
            .map(|scope| ("scope".to_string(), scope)),
    )
    .chain(
        page.request
            .state
            .clone()
            .map(|state| ("state".to_string(), state)),
    )
    .map(|(name, value)| {
        format!(
            r#"    <input type="hidden" name="{}" value="{}">{}"#,
            escape_html(&name),
            escape_html(&value),
            "\n"
        )
    })
    .collect();

    Ok(Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Authorize {client}</title></head>
<body>
  <h1>{client} is requesting access</h1>
  <ul>
{scope_items}  </ul>
  <form method="post" action="/auth/authorize/decision">
{hidden_fields}    <button type="submit" name="decision" value="approve">Approve</button>
    <button type="submit" name="decision" value="deny">Deny</button>
  </form>
</body>
</html>"#,
        client = escape_html(&page.client_name),
    )))
}

/// POST /auth/authorize/decision - process the user's approve/deny.
pub async fn decision_handler(
    State(state): State<AppState>,
    Extension(auth_session): Extension<AuthSession>,
    Form(form): Form<DecisionForm>,
) -> Result<Response> {
    let (decision, command) = form.parse()?;

    let oauth = oauth_service(&state);
    oauth
        .validate_client(
            &command.client_id,
            &command.redirect_uri,
            GrantType::AuthorizationCode,
        )
        .await?;

    let consent = ConsentService::new(state.repos.clone());
    consent
        .process_consent(auth_session.user_id, &decision, &command)
        .await?;

    let redirect = oauth
        .generate_auth_code(auth_session.user_id, &command)
        .await?;
    let location = redirect.build_redirect_url(&command.redirect_uri)?;
    Ok(redirect_found(&location))
}

/// POST /auth/token - exchange an authorization code for an access token.
pub async fn token_handler(
    State(state): State<AppState>,
    Form(form): Form<TokenRequestForm>,
) -> Result<Response> {
    let command = form.parse()?;
    let response = oauth_service(&state).exchange_token(command).await?;
    Ok(Json(response).into_response())
}

/// GET /auth/.well-known/jwks.json - public signing keys.
pub async fn jwks_handler(State(state): State<AppState>) -> Result<Response> {
    let jwks = state.jwks.get_jwks()?;
    Ok((
        [(header::CACHE_CONTROL, "public, max-age=3600")],
        Json(jwks),
    )
        .into_response())
}
