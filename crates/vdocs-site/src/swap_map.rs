//! Read-mostly keyed cache with lock-free reads.
//!
//! [`SwapMap`] publishes an immutable `HashMap` snapshot through `ArcSwap`.
//! Readers load the snapshot without locking; writers serialize on a mutex,
//! copy the map, modify the copy and swap it in.
//!
//! Entries carry the time they were built so reads can apply a TTL. Each key
//! has a generation counter, so a builder that started before that key was
//! invalidated detects that its result is stale and skips the insert.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::time::Instant;

struct Stamped<V> {
    value: Arc<V>,
    built_at: Instant,
}

impl<V> Clone for Stamped<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            built_at: self.built_at,
        }
    }
}

type Snapshot<K, V> = HashMap<K, Stamped<V>>;

/// Key of a per-version artifact (navigation tree, search index).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct VersionKey {
    pub tenant_id: String,
    pub version_id: String,
}

impl VersionKey {
    pub fn new(tenant_id: &str, version_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_owned(),
            version_id: version_id.to_owned(),
        }
    }

    pub fn is(&self, tenant_id: &str, version_id: &str) -> bool {
        self.tenant_id == tenant_id && self.version_id == version_id
    }
}

pub(crate) struct SwapMap<K, V> {
    current: ArcSwap<Snapshot<K, V>>,
    /// Held by writers. Maps each key ever built to its invalidation count.
    generations: Mutex<HashMap<K, u64>>,
    ttl: Duration,
}

impl<K, V> SwapMap<K, V>
where
    K: Clone + Eq + Hash,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            current: ArcSwap::from_pointee(HashMap::new()),
            generations: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Current generation of `key`. Read it before building a value and pass
    /// it to [`insert_if_current`](Self::insert_if_current).
    pub fn generation(&self, key: &K) -> u64 {
        *self.generations.lock().entry(key.clone()).or_insert(0)
    }

    /// Get a live entry.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let snapshot = self.current.load();
        snapshot
            .get(key)
            .filter(|entry| entry.built_at.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.value))
    }

    fn modify<R>(&self, f: impl FnOnce(&mut Snapshot<K, V>, &mut HashMap<K, u64>) -> R) -> R {
        let mut generations = self.generations.lock();
        let mut next = HashMap::clone(&self.current.load_full());
        let result = f(&mut next, &mut generations);
        self.current.store(Arc::new(next));
        result
    }

    /// Insert `value` unless `key` was invalidated after `generation` was read.
    pub fn insert_if_current(&self, key: K, value: Arc<V>, generation: u64) -> bool {
        self.modify(|map, generations| {
            if generations.get(&key).copied().unwrap_or(0) != generation {
                return false;
            }
            map.insert(
                key,
                Stamped {
                    value,
                    built_at: Instant::now(),
                },
            );
            true
        })
    }

    /// Replace the value of an existing entry, keeping its build time.
    ///
    /// Entries that are absent or expired are left alone.
    pub fn update(&self, key: &K, f: impl FnOnce(&V) -> V) -> bool {
        self.modify(|map, _| {
            let Some(entry) = map.get_mut(key) else {
                return false;
            };
            if entry.built_at.elapsed() >= self.ttl {
                return false;
            }
            entry.value = Arc::new(f(&entry.value));
            true
        })
    }

    /// Remove matching entries. Builds of matching keys that are running
    /// now will skip their insert; other keys are unaffected.
    pub fn remove_where(&self, pred: impl Fn(&K) -> bool) -> usize {
        self.modify(|map, generations| {
            generations
                .iter_mut()
                .filter(|(key, _)| pred(key))
                .for_each(|(_, generation)| *generation += 1);
            let before = map.len();
            map.retain(|key, _| !pred(key));
            before - map.len()
        })
    }

    /// Remove expired entries.
    pub fn evict_expired(&self) -> usize {
        self.modify(|map, _| {
            let before = map.len();
            map.retain(|_, entry| entry.built_at.elapsed() < self.ttl);
            before - map.len()
        })
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }
}
