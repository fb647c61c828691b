//! Shared atmospheric snapshot cache.
//!
//! Entries are keyed by rounded coordinate. Within the TTL an entry is served
//! as is; up to twice the TTL it is served stale while a single background
//! refresh runs. Concurrent misses on one key wait on the same outstanding
//! fetch. A fetch that fails or exceeds the timeout never blocks scoring: the
//! caller gets the last known reading or the calm default, marked degraded.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use flightpath_core::{AtmosphereError, AtmosphereProvider, AtmosphericSnapshot, Coordinate, SnapshotKey};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait CacheEntry {
    fn fetched_at(&self) -> Instant;
}

/// Drop entries older than `max_age`, then the oldest until at most
/// `max_entries` remain. Returns how many were removed.
pub fn prune_cache<K, V>(cache: &DashMap<K, V>, max_entries: usize, max_age: Duration) -> usize
where
    K: Clone + Eq + Hash,
    V: CacheEntry,
{
    let before = cache.len();
    cache.retain(|_, entry| entry.fetched_at().elapsed() <= max_age);

    if cache.len() > max_entries {
        let mut by_age: Vec<(K, Instant)> = cache
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().fetched_at()))
            .collect();
        by_age.sort_by_key(|(_, fetched_at)| *fetched_at);
        let excess = cache.len() - max_entries;
        for (key, _) in by_age.into_iter().take(excess) {
            cache.remove(&key);
        }
    }

    before.saturating_sub(cache.len())
}

#[derive(Debug, Clone)]
struct CachedSnapshot {
    snapshot: AtmosphericSnapshot,
    fetched_at: Instant,
}

impl CacheEntry for CachedSnapshot {
    fn fetched_at(&self) -> Instant {
        self.fetched_at
    }
}

type InFlight = Shared<BoxFuture<'static, Option<AtmosphericSnapshot>>>;

pub struct SnapshotCache<P> {
    provider: Arc<P>,
    entries: Arc<DashMap<SnapshotKey, CachedSnapshot>>,
    in_flight: Arc<DashMap<SnapshotKey, InFlight>>,
    ttl: Duration,
    timeout: Duration,
}

impl<P> SnapshotCache<P>
where
    P: AtmosphereProvider + 'static,
{
    pub fn new(provider: P, ttl: Duration, timeout: Duration) -> Self {
        Self {
            provider: Arc::new(provider),
            entries: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            ttl,
            timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn prune(&self, max_entries: usize) -> usize {
        prune_cache(&self.entries, max_entries, self.ttl.saturating_mul(2))
    }

    /// Snapshot for `at`; never fails.
    pub async fn lookup(&self, at: Coordinate) -> AtmosphericSnapshot {
        let key = SnapshotKey::from_coordinate(at);
        let cached = self
            .entries
            .get(&key)
            .map(|entry| (entry.snapshot.clone(), entry.fetched_at.elapsed()));

        let mut fallback = None;
        if let Some((snapshot, age)) = cached {
            if age <= self.ttl {
                return snapshot;
            }
            if age <= self.ttl.saturating_mul(2) {
                let (refresh, started) = self.fetch_shared(key);
                if started {
                    tracing::debug!("Refreshing stale snapshot at ({:.4}, {:.4})", at.lat, at.lon);
                    tokio::spawn(refresh);
                }
                return snapshot;
            }
            fallback = Some(snapshot);
        }

        let (fetch, started) = self.fetch_shared(key);
        if !started {
            tracing::debug!("Joining in-flight snapshot fetch at ({:.4}, {:.4})", at.lat, at.lon);
        }
        match fetch.await {
            Some(snapshot) => snapshot,
            None => fallback
                .map(AtmosphericSnapshot::into_degraded)
                .unwrap_or_else(AtmosphericSnapshot::degraded_default),
        }
    }

    /// The outstanding fetch for `key`, starting one if none is running.
    fn fetch_shared(&self, key: SnapshotKey) -> (InFlight, bool) {
        match self.in_flight.entry(key) {
            Entry::Occupied(existing) => (existing.get().clone(), false),
            Entry::Vacant(slot) => {
                let fetch = self.fetch_once(key).boxed().shared();
                slot.insert(fetch.clone());
                (fetch, true)
            }
        }
    }

    fn fetch_once(
        &self,
        key: SnapshotKey,
    ) -> impl Future<Output = Option<AtmosphericSnapshot>> + Send + 'static {
        let provider = Arc::clone(&self.provider);
        let entries = Arc::clone(&self.entries);
        let in_flight = Arc::clone(&self.in_flight);
        let timeout = self.timeout;

        async move {
            let at = key.coordinate();
            let result = match tokio::time::timeout(timeout, provider.fetch(at)).await {
                Ok(result) => result,
                Err(_) => Err(AtmosphereError::Timeout(timeout.as_millis() as u64)),
            };
            in_flight.remove(&key);

            match result {
                Ok(snapshot) => {
                    entries.insert(
                        key,
                        CachedSnapshot {
                            snapshot: snapshot.clone(),
                            fetched_at: Instant::now(),
                        },
                    );
                    Some(snapshot)
                }
                Err(err) => {
                    tracing::warn!(
                        "Snapshot fetch failed at ({:.4}, {:.4}): {}",
                        at.lat,
                        at.lon,
                        err
                    );
                    None
                }
            }
        }
    }

    #[cfg(test)]
    fn insert_aged(&self, at: Coordinate, snapshot: AtmosphericSnapshot, age: Duration) {
        let fetched_at = Instant::now().checked_sub(age).unwrap_or_else(Instant::now);
        self.entries.insert(
            SnapshotKey::from_coordinate(at),
            CachedSnapshot { snapshot, fetched_at },
        );
    }
}

impl<P> AtmosphereProvider for SnapshotCache<P>
where
    P: AtmosphereProvider + 'static,
{
    async fn fetch(&self, at: Coordinate) -> Result<AtmosphericSnapshot, AtmosphereError> {
        Ok(self.lookup(at).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        delay: Duration,
        cape: f64,
        fail: bool,
    }

    impl CountingProvider {
        fn new(delay: Duration, cape: f64) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let provider = Self {
                calls: Arc::clone(&calls),
                delay,
                cape,
                fail: false,
            };
            (provider, calls)
        }
    }

    impl AtmosphereProvider for CountingProvider {
        async fn fetch(&self, _at: Coordinate) -> Result<AtmosphericSnapshot, AtmosphereError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(AtmosphereError::Status(503));
            }
            Ok(AtmosphericSnapshot {
                cape: self.cape,
                ..AtmosphericSnapshot::calm()
            })
        }
    }

    const DEL: Coordinate = Coordinate::new(28.5562, 77.1000);

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let (provider, calls) = CountingProvider::new(Duration::from_millis(50), 10.0);
        let cache = SnapshotCache::new(provider, Duration::from_secs(60), Duration::from_secs(1));

        let lookups = (0..8).map(|_| cache.lookup(DEL));
        let snapshots = futures::future::join_all(lookups).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(snapshots.iter().all(|s| s.cape == 10.0 && !s.degraded));
        assert_eq!(cache.len(), 1);

        // Fresh entries are served without another call.
        cache.lookup(Coordinate::new(28.55621, 77.10001)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_entry_served_while_refreshing() {
        let (provider, calls) = CountingProvider::new(Duration::from_millis(20), 42.0);
        let ttl = Duration::from_secs(1);
        let cache = SnapshotCache::new(provider, ttl, Duration::from_secs(1));
        cache.insert_aged(DEL, AtmosphericSnapshot::calm(), Duration::from_millis(1500));

        let stale = cache.lookup(DEL).await;
        assert_eq!(stale.cape, 0.0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let fresh = cache.lookup(DEL).await;
        assert_eq!(fresh.cape, 42.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_degrades_to_default() {
        let (provider, _calls) = CountingProvider::new(Duration::from_millis(500), 99.0);
        let cache = SnapshotCache::new(provider, Duration::from_secs(60), Duration::from_millis(20));

        let snapshot = cache.lookup(DEL).await;
        assert!(snapshot.degraded);
        assert_eq!(snapshot.cape, 0.0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn failure_falls_back_to_expired_reading() {
        let (mut provider, _calls) = CountingProvider::new(Duration::from_millis(1), 0.0);
        provider.fail = true;
        let cache = SnapshotCache::new(provider, Duration::from_millis(100), Duration::from_secs(1));
        let old = AtmosphericSnapshot {
            cape: 1500.0,
            ..AtmosphericSnapshot::calm()
        };
        cache.insert_aged(DEL, old, Duration::from_secs(1));

        let snapshot = cache.lookup(DEL).await;
        assert!(snapshot.degraded);
        assert_eq!(snapshot.cape, 1500.0);
    }

    #[test]
    fn prune_drops_oldest_beyond_capacity() {
        let (provider, _calls) = CountingProvider::new(Duration::ZERO, 0.0);
        let cache = SnapshotCache::new(provider, Duration::from_secs(1), Duration::from_secs(1));
        for (idx, age) in [50u64, 500, 1500, 2500].into_iter().enumerate() {
            cache.insert_aged(
                Coordinate::new(10.0 + idx as f64, 70.0),
                AtmosphericSnapshot::calm(),
                Duration::from_millis(age),
            );
        }

        // 2.5 s is past twice the TTL; then the 1.5 s entry is the oldest.
        let removed = cache.prune(2);
        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 2);
    }
}
