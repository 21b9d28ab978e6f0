// core/common/src/cache.rs
// In-memory memo cache with per-entry expiry

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::clock::Clock;

struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Values keyed by string, each dropped once its time-to-live has passed.
///
/// Expiry is measured with the injected [`Clock`]; stale entries are ignored
/// on read and removed by the next write to the same key or by
/// [`MemoryCache::purge_expired`].
pub struct MemoryCache<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> MemoryCache<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        entries
            .get(key)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.value.clone())
    }

    /// Stores `value` for `ttl`, replacing any previous entry. A zero or
    /// negative `ttl` removes the key instead.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if ttl <= Duration::zero() {
            entries.remove(&key);
            return;
        }

        let expires_at = self
            .clock
            .now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        entries.insert(key, Entry { value, expires_at });
    }

    /// Cached value for `key`, or the result of `produce`, stored for `ttl`.
    /// `produce` runs without holding the lock; concurrent misses may both
    /// run it and the last one stored wins.
    pub fn get_or_set<F>(&self, key: &str, produce: F, ttl: Duration) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(key) {
            return value;
        }

        debug!(key = key, "Cache miss");
        let value = produce();
        self.set(key, value.clone(), ttl);
        value
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key)
            .is_some()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    /// Stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
