//! Random material generation: authorization codes, session ids, client
//! identifiers and client secrets.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{Rng, RngCore};

/// Length in bytes of authorization codes and session ids (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Length of generated client secrets.
pub const CLIENT_SECRET_LENGTH: usize = 48;

/// Character set for client secrets.
const SECRET_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// 32 random bytes, base64url without padding (43 chars).
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Opaque authorization code.
pub fn generate_code() -> String {
    generate_token()
}

/// Opaque session id for the session cookie.
pub fn generate_session_id() -> String {
    generate_token()
}

/// Opaque public client identifier (32 base64url chars from 24 bytes).
pub fn generate_client_id() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Plaintext client secret; returned to the owner exactly once.
pub fn generate_client_secret() -> String {
    let mut rng = rand::thread_rng();
    (0..CLIENT_SECRET_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..SECRET_CHARSET.len());
            SECRET_CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClientId;

    #[test]
    fn token_is_43_base64url_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn tokens_do_not_repeat() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_client_id_passes_validation() {
        let id = generate_client_id();
        assert!(ClientId::parse(&id).is_ok());
    }

    #[test]
    fn client_secret_shape() {
        let secret = generate_client_secret();
        assert_eq!(secret.len(), CLIENT_SECRET_LENGTH);
        assert!(secret.bytes().all(|b| SECRET_CHARSET.contains(&b)));
    }
}
