//! Scheduled cleanup tasks for expired/stale session data.

use crate::db::Database;
use std::time::Duration;
use tracing::{error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once.
pub async fn run_cleanup(db: &Database) {
    // Clean up expired sessions
    match db.sessions().delete_expired().await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired sessions", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up expired sessions: {}", e),
    }

    // Clean up pending sessions whose second factor never completed
    match db.sessions().delete_stale_pending().await {
        Ok(count) if count > 0 => info!("Cleaned up {} stale pending sessions", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up stale pending sessions: {}", e),
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&db).await;
        }
    })
}
