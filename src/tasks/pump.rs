//! Event Pump Task
//!
//! Optional background task that drains the event bus on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::EventBus;

/// Spawns a background task that drains up to `batch` events every interval.
///
/// Exits as soon as `shutdown` is cancelled.
pub fn spawn_event_pump(
    bus: Arc<EventBus>,
    interval_secs: u64,
    batch: usize,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting event pump with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            // Handlers are synchronous callbacks; keep them off the async workers
            let drained = {
                let bus = bus.clone();
                tokio::task::spawn_blocking(move || bus.drain(batch).len()).await
            };

            match drained {
                Ok(count) if count > 0 => debug!("Event pump: processed {} events", count),
                Ok(_) => {}
                Err(e) => warn!("Event pump: drain task failed: {}", e),
            }
        }

        info!("Event pump stopped");
    })
}
