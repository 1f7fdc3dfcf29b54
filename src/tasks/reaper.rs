//! Expiry Reaper Task
//!
//! Background task that periodically sweeps expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{current_timestamp_ms, EntryStore};

/// Spawns a background task that periodically sweeps expired entries.
///
/// The task sleeps for the interval between sweeps and exits as soon as
/// `shutdown` is cancelled. Store shards are only locked while a sweep runs,
/// never across the sleep.
///
/// # Arguments
/// * `store` - Shared entry store
/// * `interval_secs` - Interval in seconds between sweeps
/// * `shutdown` - Cancelled to stop the task
///
/// # Returns
/// A JoinHandle for the spawned task, awaited during shutdown.
///
/// # Example
/// ```ignore
/// let store = Arc::new(EntryStore::new());
/// let shutdown = CancellationToken::new();
/// let reaper = spawn_reaper(store.clone(), 3600, shutdown.clone());
/// // Later, during shutdown:
/// shutdown.cancel();
/// reaper.await?;
/// ```
pub fn spawn_reaper(
    store: Arc<EntryStore>,
    interval_secs: u64,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting expiry reaper with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let removed = store.sweep_expired(current_timestamp_ms());

            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }

        info!("Expiry reaper stopped");
    })
}
