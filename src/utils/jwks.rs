use std::sync::{Arc, OnceLock};

use anyhow::Context;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rsa::{
    pkcs1::DecodeRsaPublicKey, pkcs8::DecodePublicKey, traits::PublicKeyParts, RsaPublicKey,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::keys::KeyProvider;

/// A single RSA signing key in JWK form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub alg: String,
    /// Modulus, base64url without padding.
    pub n: String,
    /// Public exponent, base64url without padding.
    pub e: String,
}

/// The published key set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// Converts the configured public PEM into a JWKS document and caches the
/// result for the process lifetime. Two calls always return equal values
/// with the same `kid`.
#[derive(Clone)]
pub struct JwksService {
    public_pem: String,
    key_id: String,
    cache: Arc<OnceLock<Jwks>>,
}

impl JwksService {
    pub fn new(keys: &KeyProvider) -> Self {
        Self {
            public_pem: keys.public_pem().to_string(),
            key_id: keys.key_id().to_string(),
            cache: Arc::new(OnceLock::new()),
        }
    }

    pub fn get_jwks(&self) -> Result<Jwks> {
        if let Some(cached) = self.cache.get() {
            return Ok(cached.clone());
        }
        let jwks = self.build()?;
        Ok(self.cache.get_or_init(|| jwks).clone())
    }

    fn build(&self) -> Result<Jwks> {
        // SPKI ("BEGIN PUBLIC KEY") first, PKCS#1 ("BEGIN RSA PUBLIC KEY")
        // as a fallback.
        let public_key = RsaPublicKey::from_public_key_pem(&self.public_pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(&self.public_pem))
            .context("failed to parse RSA public key PEM")
            .map_err(Error::ServerError)?;

        let n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());

        Ok(Jwks {
            keys: vec![Jwk {
                kty: "RSA".to_string(),
                kid: self.key_id.clone(),
                key_use: "sig".to_string(),
                alg: "RS256".to_string(),
                n,
                e,
            }],
        })
    }
}
