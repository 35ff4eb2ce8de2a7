//! OAuth 2.0 authorization server: Authorization Code grant with mandatory
//! PKCE, cookie sessions, a consent gate in front of code issuance, and
//! RS256 access tokens published through JWKS.

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;
pub mod workers;

pub use config::{AppState, Config};
pub use error::{Error, Result};
pub use handlers::create_router;
