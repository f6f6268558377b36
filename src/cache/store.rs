//! The in-process TTL store with namespace version counters.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Key/value store with TTL and atomic per-namespace version counters.
///
/// Values are stored as serialized JSON strings; the typed [`get_with`]
/// helper layers cache-aside semantics on top. Expired entries are treated
/// as absent on read and physically removed by [`sweep`], which the server
/// runs on an interval.
///
/// [`get_with`]: CacheStore::get_with
/// [`sweep`]: CacheStore::sweep
#[derive(Default)]
pub struct CacheStore {
    entries: DashMap<String, CacheEntry>,
    versions: DashMap<String, AtomicU64>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version for a namespace, created at 1 when absent.
    pub fn version(&self, namespace: &str) -> u64 {
        self.versions
            .entry(namespace.to_string())
            .or_insert_with(|| AtomicU64::new(1))
            .load(Ordering::SeqCst)
    }

    /// Atomically increment a namespace version, returning the new value.
    ///
    /// Every key minted under the previous version is orphaned from this
    /// point on and left to expire through its TTL.
    pub fn bump_version(&self, namespace: &str) -> u64 {
        counter!("folio_cache_version_bump_total").increment(1);
        self.versions
            .entry(namespace.to_string())
            .or_insert_with(|| AtomicU64::new(1))
            .fetch_add(1, Ordering::SeqCst)
            + 1
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        // The shard guard must be released before removing an expired entry.
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                counter!("folio_cache_hit_total").increment(1);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(key);
        }
        counter!("folio_cache_miss_total").increment(1);
        None
    }

    pub fn put_raw(&self, key: &str, value: String, ttl: Option<Duration>) {
        let entry = CacheEntry {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.insert(key.to_string(), entry);
    }

    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Typed cache-aside fetch.
    ///
    /// On a hit the stored payload is deserialized and returned. A payload
    /// that no longer deserializes is treated as a cold miss: logged,
    /// re-fetched, and overwritten; callers never observe the corruption.
    /// Exactly one cache write happens per miss.
    pub async fn get_with<T, F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(raw) = self.get_raw(key) {
            match serde_json::from_str(&raw) {
                Ok(value) => return Ok(value),
                Err(error) => {
                    counter!("folio_cache_decode_failure_total").increment(1);
                    warn!(key, %error, "cached payload failed to decode, refetching");
                }
            }
        }

        let value = fetch().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => self.put_raw(key, raw, Some(ttl)),
            Err(error) => warn!(key, %error, "failed to serialize value for cache"),
        }

        Ok(value)
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - self.entries.len();
        if removed > 0 {
            counter!("folio_cache_sweep_removed_total").increment(removed as u64);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    #[test]
    fn version_starts_at_one_and_bumps_by_one() {
        let store = CacheStore::new();

        assert_eq!(store.version("posts:list"), 1);
        assert_eq!(store.bump_version("posts:list"), 2);
        assert_eq!(store.version("posts:list"), 2);

        // Bumping an unseen namespace creates it first.
        assert_eq!(store.bump_version("posts:detail"), 2);
    }

    #[test]
    fn raw_roundtrip_and_delete() {
        let store = CacheStore::new();

        assert!(store.get_raw("k").is_none());
        store.put_raw("k", "v".to_string(), None);
        assert_eq!(store.get_raw("k").as_deref(), Some("v"));

        store.delete("k");
        assert!(store.get_raw("k").is_none());
    }

    #[test]
    fn expired_entries_read_as_absent() {
        let store = CacheStore::new();
        store.put_raw("k", "v".to_string(), Some(Duration::ZERO));

        std::thread::sleep(Duration::from_millis(5));
        assert!(store.get_raw("k").is_none());
    }

    #[test]
    fn sweep_drops_only_expired_entries() {
        let store = CacheStore::new();
        store.put_raw("dead", "x".to_string(), Some(Duration::ZERO));
        store.put_raw("alive", "y".to_string(), Some(Duration::from_secs(60)));
        store.put_raw("forever", "z".to_string(), None);

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.sweep(), 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn get_with_fetches_once_then_hits() {
        let store = CacheStore::new();
        let mut calls = 0u32;

        let first: Result<u32, Infallible> = store
            .get_with("answer", Duration::from_secs(60), || {
                calls += 1;
                async { Ok(42u32) }
            })
            .await;
        assert_eq!(first, Ok(42));
        assert_eq!(calls, 1);

        let second: Result<u32, Infallible> = store
            .get_with("answer", Duration::from_secs(60), || {
                calls += 1;
                async { Ok(7u32) }
            })
            .await;
        assert_eq!(second, Ok(42));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn get_with_recovers_from_corrupt_payload() {
        let store = CacheStore::new();
        store.put_raw("answer", "not json".to_string(), None);

        let value: Result<u32, Infallible> = store
            .get_with("answer", Duration::from_secs(60), || async { Ok(42u32) })
            .await;
        assert_eq!(value, Ok(42));

        // The corrupt payload was overwritten with the fresh value.
        assert_eq!(store.get_raw("answer").as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn old_version_entries_are_never_served_under_new_keys() {
        let store = CacheStore::new();

        let v1 = store.version("posts:list");
        store.put_raw(&format!("posts:list:{v1}:10:-:-"), "old".to_string(), None);

        let v2 = store.bump_version("posts:list");
        assert!(store.get_raw(&format!("posts:list:{v2}:10:-:-")).is_none());
    }
}
