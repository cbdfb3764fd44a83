//! Periodic removal of expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use vdocs_site::Engine;

/// Spawn a task that evicts expired cache entries every `interval`.
///
/// The task runs until aborted.
pub(crate) fn spawn_sweeper(engine: Arc<Engine>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let evicted = engine.evict_expired();
            if evicted > 0 {
                let stats = engine.cache_stats();
                tracing::debug!(
                    evicted,
                    documents = stats.documents,
                    navigation_trees = stats.navigation_trees,
                    search_indexes = stats.search_indexes,
                    "Evicted expired cache entries"
                );
            }
        }
    })
}
