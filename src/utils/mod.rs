pub mod jwks;
pub mod jwt;
pub mod keys;
pub mod password;
pub mod pkce;
pub mod secret;
