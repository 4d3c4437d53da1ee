//! Background sweep of expired cache entries.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::Cache;

/// Start the fixed-cadence sweep. The task stops when `shutdown` is
/// cancelled and is meant to be joined during shutdown.
pub fn spawn_sweeper(cache: Arc<Cache>, shutdown: CancellationToken) -> JoinHandle<()> {
    let interval = cache.config().sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so a fresh cache
        // is not swept at startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = cache.remove_expired();
                    if removed > 0 {
                        debug!(removed, "cache sweep removed expired entries");
                    }
                }
            }
        }
    })
}
