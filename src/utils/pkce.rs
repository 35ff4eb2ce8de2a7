//! PKCE (RFC 7636) challenge verification.
//!
//! The client sends a code challenge at authorize time and proves possession
//! of the matching verifier at token time. Verification is a pure predicate:
//! no branch logs or short-circuits in a way that changes the result.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};

use crate::models::value_objects::{CodeChallenge, CodeChallengeMethod, CodeVerifier};

/// Compute `base64url(SHA256(verifier))`, the S256 transformation.
pub fn compute_s256_challenge(code_verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Verify a code verifier against the challenge stored on the authorization
/// code, under the challenge's own method.
pub fn verify(challenge: &CodeChallenge, verifier: &CodeVerifier) -> bool {
    match challenge.method() {
        CodeChallengeMethod::S256 => {
            let computed = compute_s256_challenge(verifier.as_str());
            constant_time_eq(&computed, challenge.challenge())
        }
        CodeChallengeMethod::Plain => constant_time_eq(verifier.as_str(), challenge.challenge()),
    }
}

/// Constant-time string comparison.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}
