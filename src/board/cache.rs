//! Time-bounded cache used to dampen repeated pull request lookups.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of the current time. Injected so expiry is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut offset) = self.offset.lock() {
            *offset += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = self.offset.lock().map(|o| *o).unwrap_or_default();
        self.start + offset
    }
}

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// Key/value cache whose entries expire `ttl` after they were stored.
///
/// Interior mutability lets one cache be shared between concurrent
/// lookups through an `Arc`.
pub struct TtlCache<K, V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fresh value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .filter(|entry| now.duration_since(entry.stored_at) < self.ttl)
            .map(|entry| entry.value.clone())
    }

    pub fn set(&self, key: K, value: V) {
        let stored_at = self.clock.now();
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, Entry { value, stored_at });
        }
    }

    /// True when `key` is missing or older than the TTL.
    pub fn is_expired(&self, key: &K) -> bool {
        self.get(key).is_none()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.stored_at) < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_clock(ttl_secs: u64) -> (TtlCache<String, u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::with_clock(Duration::from_secs(ttl_secs), clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_get_returns_fresh_value() {
        let (cache, _clock) = cache_with_clock(60);
        cache.set("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert!(!cache.is_expired(&"a".to_string()));
    }

    #[test]
    fn test_missing_key_is_expired() {
        let (cache, _clock) = cache_with_clock(60);
        assert!(cache.is_expired(&"nope".to_string()));
        assert_eq!(cache.get(&"nope".to_string()), None);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let (cache, clock) = cache_with_clock(60);
        cache.set("a".to_string(), 1);
        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        clock.advance(Duration::from_secs(1));
        assert!(cache.is_expired(&"a".to_string()));
    }

    #[test]
    fn test_set_refreshes_timestamp() {
        let (cache, clock) = cache_with_clock(10);
        cache.set("a".to_string(), 1);
        clock.advance(Duration::from_secs(8));
        cache.set("a".to_string(), 2);
        clock.advance(Duration::from_secs(8));
        assert_eq!(cache.get(&"a".to_string()), Some(2));
    }

    #[test]
    fn test_purge_expired_removes_only_stale_entries() {
        let (cache, clock) = cache_with_clock(10);
        cache.set("old".to_string(), 1);
        clock.advance(Duration::from_secs(11));
        cache.set("new".to_string(), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(!cache.is_empty());
        assert_eq!(cache.get(&"new".to_string()), Some(2));
    }
}
