use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;

use crate::config::AppState;
use crate::health::ComponentHealth;

/// GET / - service metadata and endpoint map.
pub async fn root_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let base = &state.config.service_url;
    Json(json!({
        "service": state.config.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "authorize": format!("{base}/auth/authorize"),
            "token": format!("{base}/auth/token"),
            "jwks": format!("{base}/auth/.well-known/jwks.json"),
            "login": format!("{base}/auth/login"),
            "register": format!("{base}/user"),
            "health": format!("{base}/health"),
        },
    }))
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// GET /health - liveness.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct DeepHealthResponse {
    status: &'static str,
    components: Vec<ComponentHealth>,
}

/// GET /health/deep - readiness across every health-checkable component.
pub async fn deep_health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (healthy, components) = state.health.check_all().await;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(DeepHealthResponse {
            status: if healthy { "ready" } else { "degraded" },
            components,
        }),
    )
}
