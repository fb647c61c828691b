//! Periodic eviction of old weather snapshots.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::state::AppState;

pub async fn run_cache_prune_loop(state: Arc<AppState>) {
    let period = Duration::from_secs(state.config().cache_prune_interval_s.max(1));
    let max_entries = state.config().weather_cache_max_entries;
    let mut ticker = interval(period);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let removed = state.cache.prune(max_entries);
        if removed > 0 {
            tracing::debug!(
                "Pruned {} weather snapshot(s), {} cached",
                removed,
                state.cache.len()
            );
        }
    }
}
