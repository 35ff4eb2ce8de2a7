use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Crate-wide error taxonomy.
///
/// Use cases raise kind-specific errors; this is the single place where each
/// kind maps to an HTTP status and the stable JSON error body. The token
/// endpoint variants (`InvalidCode`, `InvalidClient`, `InvalidUser`,
/// `InvalidCreationToken`) carry fixed messages so a client cannot tell an
/// expired code from a replayed or unknown one.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{message}")]
    ValidateRequest {
        message: String,
        error_list: Option<Vec<String>>,
    },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired session")]
    InvalidSession,

    #[error("Invalid client")]
    InvalidClient,

    #[error("Invalid authorization code")]
    InvalidCode,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid user")]
    InvalidUser,

    #[error("Consent was denied")]
    DenyConsent,

    #[error("Token issuance failed")]
    InvalidCreationToken,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error")]
    ServerError(#[from] anyhow::Error),
}

impl Error {
    /// Shorthand for a single-message validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::ValidateRequest {
            message: message.into(),
            error_list: None,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::ValidateRequest { .. } => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials
            | Error::InvalidSession
            | Error::InvalidClient
            | Error::InvalidCode
            | Error::InvalidToken
            | Error::InvalidUser
            | Error::DenyConsent
            | Error::InvalidCreationToken => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Error::ValidateRequest { .. } => "validate_request",
            Error::InvalidCredentials => "invalid_credentials",
            Error::InvalidSession => "invalid_session",
            Error::InvalidClient => "invalid_client",
            Error::InvalidCode => "invalid_code",
            Error::InvalidToken => "invalid_token",
            Error::InvalidUser => "invalid_user",
            Error::DenyConsent => "deny_consent",
            Error::InvalidCreationToken => "invalid_creation_token",
            Error::Forbidden => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::ServerError(_) => "server_error",
        }
    }
}

/// Stable JSON error body rendered at the HTTP boundary.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(rename = "errorList", skip_serializing_if = "Option::is_none")]
    pub error_list: Option<Vec<String>>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if let Error::ServerError(ref cause) = self {
            tracing::error!("internal error: {cause:#}");
        }

        let status = self.status();
        let error_list = match &self {
            Error::ValidateRequest { error_list, .. } => error_list.clone(),
            _ => None,
        };
        let body = Json(ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
            error_list,
        });

        (status, body).into_response()
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
