//! Time-bounded memo of resolved queries.
//!
//! One mutex guards the whole map. Expired entries are dropped when a
//! lookup touches them, and [`QueryCache::purge_expired`] can be driven by
//! a background timer.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::query::{CacheKey, Query};

/// Entry lifetime used when none is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
struct CacheEntry {
    query: Query,
    expires_at: Instant,
}

/// Shared cache of resolved queries keyed by [`Query::canonical_key`].
#[derive(Debug)]
pub struct QueryCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // A panic while holding the lock cannot leave the map half-written, so
    // a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a live entry, evicting it if it has expired.
    pub fn get(&self, key: &CacheKey) -> Option<Query> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.query.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert or replace an entry; it expires one TTL from now.
    pub fn put(&self, key: CacheKey, query: Query) {
        let expires_at = Instant::now() + self.ttl;
        self.lock().insert(key, CacheEntry { query, expires_at });
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::OwnerPolicy;
    use crate::route::parse_route;
    use std::sync::Arc;

    fn query(path: &str) -> Query {
        let owners = OwnerPolicy {
            default_user: "jpillora".into(),
            ..OwnerPolicy::default()
        };
        Query::new(parse_route(path).unwrap(), &owners)
    }

    #[test]
    fn test_put_then_get_hits() {
        let cache = QueryCache::default();
        let q = query("/astral-sh/uv");
        let key = q.canonical_key().unwrap();
        cache.put(key.clone(), q.clone());
        assert_eq!(cache.get(&key), Some(q));
    }

    #[test]
    fn test_miss_for_other_key() {
        let cache = QueryCache::default();
        let q = query("/astral-sh/uv");
        cache.put(q.canonical_key().unwrap(), q);
        let other = query("/astral-sh/uv!").canonical_key().unwrap();
        assert_eq!(cache.get(&other), None);
    }

    #[test]
    fn test_expired_entry_misses() {
        let cache = QueryCache::new(Duration::from_millis(20));
        let q = query("/jedisct1/piknik");
        let key = q.canonical_key().unwrap();
        cache.put(key.clone(), q);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(cache.get(&key), None);
        // lazily evicted on lookup
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let cache = QueryCache::new(Duration::from_millis(20));
        let a = query("/a/one");
        let b = query("/b/two");
        cache.put(a.canonical_key().unwrap(), a);
        cache.put(b.canonical_key().unwrap(), b);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(QueryCache::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let q = query(&format!("/owner/prog{i}"));
                    let key = q.canonical_key().unwrap();
                    cache.put(key.clone(), q);
                    cache.get(&key).is_some()
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(cache.len(), 8);
    }
}
