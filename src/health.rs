//! Health-check capability and the registry assembled at startup.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

/// Implemented by components that can probe their own readiness.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &'static str;
    async fn check(&self) -> anyhow::Result<()>;
}

/// Per-component outcome reported by the deep health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: &'static str,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Immutable set of checks, built once in the composition root before the
/// listener starts.
#[derive(Clone, Default)]
pub struct HealthRegistry {
    checks: Arc<Vec<Arc<dyn HealthCheck>>>,
}

impl HealthRegistry {
    pub fn new(checks: Vec<Arc<dyn HealthCheck>>) -> Self {
        Self {
            checks: Arc::new(checks),
        }
    }

    /// Run every registered check; returns overall status plus the
    /// per-component breakdown.
    pub async fn check_all(&self) -> (bool, Vec<ComponentHealth>) {
        let mut components = Vec::with_capacity(self.checks.len());
        let mut all_healthy = true;
        for check in self.checks.iter() {
            match check.check().await {
                Ok(()) => components.push(ComponentHealth {
                    name: check.name(),
                    healthy: true,
                    detail: None,
                }),
                Err(e) => {
                    all_healthy = false;
                    tracing::warn!(component = check.name(), "health check failed: {e:#}");
                    components.push(ComponentHealth {
                        name: check.name(),
                        healthy: false,
                        detail: Some(e.to_string()),
                    });
                }
            }
        }
        (all_healthy, components)
    }
}

#[async_trait]
impl HealthCheck for crate::utils::jwks::JwksService {
    fn name(&self) -> &'static str {
        "jwks"
    }

    async fn check(&self) -> anyhow::Result<()> {
        self.get_jwks()
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("{e}"))
    }
}
