use std::sync::Arc;
use std::time::Duration;

use sqlx::mysql::MySqlPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oauth2_server::config::{AppState, Config};
use oauth2_server::create_router;
use oauth2_server::health::HealthCheck;
use oauth2_server::repositories::{mysql::MySqlStoreHealth, Repositories};
use oauth2_server::utils::keys::KeyProvider;
use oauth2_server::workers::spawn_cleanup_worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "oauth2_server={level},tower_http={level}",
                    level = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Missing key material is fatal; there is no embedded fallback.
    let keys = KeyProvider::load("keys", config.jwt_key_id.clone())?;

    let mut extra_checks: Vec<Arc<dyn HealthCheck>> = Vec::new();
    let repos = match &config.database_url {
        Some(database_url) => {
            let pool = MySqlPoolOptions::new()
                .max_connections(10)
                .min_connections(2)
                .acquire_timeout(Duration::from_secs(5))
                .idle_timeout(Duration::from_secs(600))
                .connect(database_url)
                .await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            extra_checks.push(Arc::new(MySqlStoreHealth::new(pool.clone())));
            Repositories::mysql(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Repositories::in_memory()
        }
    };

    let addr = config.socket_addr();
    let cleanup_interval_ms = config.auto_cleanup_interval_ms;
    let state = AppState::new(config, repos.clone(), &keys, extra_checks)?;

    let cleanup = spawn_cleanup_worker(repos, cleanup_interval_ms);

    let app = create_router(state);

    tracing::info!(
        "auth server v{} listening on {addr}",
        env!("CARGO_PKG_VERSION")
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cleanup.abort();
    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        },
    }
}
