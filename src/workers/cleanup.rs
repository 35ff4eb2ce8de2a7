use std::time::Duration;

use tokio::time::interval;

use crate::repositories::{AuthCodeRepository, Repositories, SessionRepository};

/// Background worker that drops expired sessions and expired-or-used
/// authorization codes at a fixed interval.
///
/// Deletion is advisory for codes (a used code is unusable either way); the
/// worker never blocks request handling and logs-and-continues on batch
/// failures.
pub struct CleanupWorker {
    repos: Repositories,
    interval_ms: u64,
}

impl CleanupWorker {
    pub fn new(repos: Repositories, interval_ms: u64) -> Self {
        Self { repos, interval_ms }
    }

    /// Run until the task is aborted.
    pub async fn run(&self) {
        tracing::info!(interval_ms = self.interval_ms, "cleanup worker started");
        let mut ticker = interval(Duration::from_millis(self.interval_ms));

        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    /// One cleanup pass. Each batch fails independently; the next tick
    /// retries.
    pub async fn run_once(&self) {
        match self.repos.sessions.delete_expired().await {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "expired sessions dropped"),
            Err(e) => tracing::error!("session cleanup failed: {e}"),
        }

        match self.repos.auth_codes.delete_expired_or_used().await {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "stale authorization codes dropped"),
            Err(e) => tracing::error!("authorization code cleanup failed: {e}"),
        }
    }
}

/// Spawn the cleanup worker as a background task.
pub fn spawn_cleanup_worker(
    repos: Repositories,
    interval_ms: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        CleanupWorker::new(repos, interval_ms).run().await;
    })
}
