use std::path::Path;

use anyhow::Context;

/// RSA key material for token signing, loaded once at startup.
///
/// Missing or unreadable PEM files are a fatal startup error; the server
/// never falls back to embedded keys.
#[derive(Debug, Clone)]
pub struct KeyProvider {
    private_pem: String,
    public_pem: String,
    key_id: String,
}

impl KeyProvider {
    /// Load `private.pem` and `public.pem` from the given directory.
    pub fn load(dir: impl AsRef<Path>, key_id: String) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let private_path = dir.join("private.pem");
        let public_path = dir.join("public.pem");
        let private_pem = std::fs::read_to_string(&private_path)
            .with_context(|| format!("failed to read signing key {}", private_path.display()))?;
        let public_pem = std::fs::read_to_string(&public_path)
            .with_context(|| format!("failed to read public key {}", public_path.display()))?;
        Ok(Self {
            private_pem,
            public_pem,
            key_id,
        })
    }

    /// Build from in-memory PEM strings (tests, embedded deployments).
    pub fn from_pem(private_pem: String, public_pem: String, key_id: String) -> Self {
        Self {
            private_pem,
            public_pem,
            key_id,
        }
    }

    pub fn private_pem(&self) -> &str {
        &self.private_pem
    }

    pub fn public_pem(&self) -> &str {
        &self.public_pem
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}
