//! Short-lived memo cache for refresh cycles.
//!
//! Entries are tagged with the wall-clock bucket they were stored in,
//! `floor(unix_seconds / ttl)`. A lookup only hits inside the same bucket, so
//! every entry goes stale at the next bucket boundary no matter when it was
//! written. Storing a value evicts entries from earlier buckets.
//!
//! The cache never computes anything itself; callers look up, compute on a
//! miss, and store.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Time-bucketed key/value cache, safe to share across tasks.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    /// Bucket width in seconds; 0 disables caching
    ttl_secs: i64,
    /// key -> (bucket, value)
    entries: Mutex<HashMap<K, (i64, V)>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create a cache with the given time-to-live; sub-second parts are dropped.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl_secs: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs.unsigned_abs())
    }

    pub fn is_enabled(&self) -> bool {
        self.ttl_secs > 0
    }

    /// Bucket a unix timestamp falls in.
    pub fn bucket(&self, now_secs: i64) -> i64 {
        if self.ttl_secs == 0 {
            now_secs
        } else {
            now_secs.div_euclid(self.ttl_secs)
        }
    }

    /// Cached value for `key`, if stored in the current bucket.
    pub fn get(&self, key: &K, now_secs: i64) -> Option<V> {
        if !self.is_enabled() {
            return None;
        }
        let bucket = self.bucket(now_secs);
        self.lock()
            .get(key)
            .filter(|(b, _)| *b == bucket)
            .map(|(_, v)| v.clone())
    }

    /// Store `value` under `key` in the current bucket.
    pub fn insert(&self, key: K, value: V, now_secs: i64) {
        if !self.is_enabled() {
            return;
        }
        let bucket = self.bucket(now_secs);
        let mut entries = self.lock();
        entries.retain(|_, (b, _)| *b >= bucket);
        entries.insert(key, (bucket, value));
    }

    /// Look up `key`, computing and storing it on a miss. Errors are not cached.
    ///
    /// The lock is not held while `compute` runs.
    pub fn get_or_try_insert_with<E, F>(&self, key: K, now_secs: i64, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key, now_secs) {
            return Ok(value);
        }
        let value = compute()?;
        self.insert(key, value.clone(), now_secs);
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// A panic while holding the lock cannot leave a half-written entry, so
    /// poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<K, (i64, V)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> TtlCache<&'static str, u32> {
        TtlCache::new(Duration::from_secs(60))
    }

    #[test]
    fn test_hit_within_bucket() {
        let cache = cache();
        cache.insert("report", 1, 120);
        assert_eq!(cache.get(&"report", 120), Some(1));
        assert_eq!(cache.get(&"report", 179), Some(1));
    }

    #[test]
    fn test_miss_after_bucket_boundary() {
        let cache = cache();
        // stored one second before the boundary, stale one second later
        cache.insert("report", 1, 179);
        assert_eq!(cache.get(&"report", 180), None);
    }

    #[test]
    fn test_insert_evicts_older_buckets() {
        let cache = cache();
        cache.insert("a", 1, 0);
        cache.insert("b", 2, 30);
        assert_eq!(cache.len(), 2);

        cache.insert("c", 3, 60);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"c", 61), Some(3));
    }

    #[test]
    fn test_get_or_try_insert_with() {
        let cache = cache();
        let mut calls = 0;

        let v: Result<u32, String> = cache.get_or_try_insert_with("k", 10, || {
            calls += 1;
            Ok(7)
        });
        assert_eq!(v, Ok(7));

        let v: Result<u32, String> = cache.get_or_try_insert_with("k", 20, || {
            calls += 1;
            Ok(8)
        });
        assert_eq!(v, Ok(7));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = cache();
        let v: Result<u32, &str> = cache.get_or_try_insert_with("k", 10, || Err("boom"));
        assert_eq!(v, Err("boom"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_ttl_disables_cache() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::ZERO);
        cache.insert("k", 1, 5);
        assert_eq!(cache.get(&"k", 5), None);
        assert!(!cache.is_enabled());
    }

    #[test]
    fn test_negative_timestamps_bucket_down() {
        let cache = cache();
        assert_eq!(cache.bucket(-1), -1);
        assert_eq!(cache.bucket(59), 0);
    }
}
