use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::utils::pkce::constant_time_eq;

/// Default bcrypt cost when `BCRYPT_ROUNDS` is not configured.
pub const DEFAULT_BCRYPT_ROUNDS: u32 = 10;

/// Hashing service for user passwords and client secrets (bcrypt), plus
/// SHA-256 digest helpers for high-entropy material.
#[derive(Debug, Clone)]
pub struct HashService {
    rounds: u32,
}

impl HashService {
    pub fn new(rounds: u32) -> Self {
        Self { rounds }
    }

    /// Hash a password or client secret with bcrypt.
    pub fn hash(&self, plain: &str) -> Result<String> {
        bcrypt::hash(plain, self.rounds)
            .map_err(|e| Error::ServerError(anyhow::anyhow!("password hashing failed: {e}")))
    }

    /// Verify a plaintext value against a stored bcrypt hash.
    pub fn verify(&self, plain: &str, hash: &str) -> Result<bool> {
        bcrypt::verify(plain, hash)
            .map_err(|e| Error::ServerError(anyhow::anyhow!("password verification failed: {e}")))
    }
}

impl Default for HashService {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_ROUNDS)
    }
}

/// Hex-encoded SHA-256 digest. Used for material that is already
/// high-entropy and only needs an equality check, never bcrypt.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time check of an input against a stored SHA-256 hex digest.
pub fn verify_sha256(input: &str, expected_hex: &str) -> bool {
    constant_time_eq(&sha256_hex(input), expected_hex)
}
