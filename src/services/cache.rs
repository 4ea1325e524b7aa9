use crate::services::logger::Logger;
use crate::services::payload::Payload;
use crate::services::request_builder::remove_query_param;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use url::Url;

/// Canonical cache key: the absolute URL with the credential query parameter
/// removed, so header and query placement share entries.
pub fn cache_key(url: &Url, credential_param: &str) -> String {
    let mut scrubbed = url.clone();
    remove_query_param(&mut scrubbed, credential_param);
    scrubbed.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub payload: Payload,
    pub etag: Option<String>,
    pub expires_at: Instant,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Result of consulting the cache for a GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Fresh(CacheEntry),
    /// Expired but carries a token worth revalidating.
    Stale(CacheEntry),
    Miss,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub evictions: u64,
    pub revalidations: u64,
}

struct CacheState {
    entries: IndexMap<String, CacheEntry>,
    stats: CacheStats,
}

/// In-memory LRU of successful GET responses. Index 0 is least recently used.
pub struct ResponseCache {
    logger: Logger,
    ttl: Duration,
    max_entries: usize,
    state: Mutex<CacheState>,
}

impl ResponseCache {
    pub fn new(logger: Logger, ttl: Duration, max_entries: usize) -> Self {
        Self {
            logger: logger.child("cache"),
            ttl,
            max_entries: max_entries.max(1),
            state: Mutex::new(CacheState {
                entries: IndexMap::new(),
                stats: CacheStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Returns the entry regardless of freshness and marks it most recently used.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut state = self.lock();
        let entry = state.entries.shift_remove(key)?;
        state.entries.insert(key.to_string(), entry.clone());
        Some(entry)
    }

    pub fn lookup(&self, key: &str, now: Instant) -> Lookup {
        let mut state = self.lock();
        let Some(entry) = state.entries.shift_remove(key) else {
            state.stats.misses += 1;
            drop(state);
            self.logger.debug("Cache miss", Some(&json!({"key": key})));
            return Lookup::Miss;
        };
        if entry.is_fresh(now) {
            state.entries.insert(key.to_string(), entry.clone());
            state.stats.hits += 1;
            drop(state);
            self.logger.debug("Cache hit", Some(&json!({"key": key})));
            return Lookup::Fresh(entry);
        }
        state.stats.misses += 1;
        if entry.etag.is_some() {
            state.entries.insert(key.to_string(), entry.clone());
            drop(state);
            self.logger
                .debug("Cache entry stale, revalidating", Some(&json!({"key": key})));
            return Lookup::Stale(entry);
        }
        drop(state);
        self.logger
            .debug("Cache entry expired", Some(&json!({"key": key})));
        Lookup::Miss
    }

    /// Inserts or replaces, then evicts from the LRU end until within bounds.
    pub fn put(&self, key: &str, entry: CacheEntry) {
        let mut state = self.lock();
        state.entries.shift_remove(key);
        state.entries.insert(key.to_string(), entry);
        state.stats.writes += 1;
        let mut evicted = Vec::new();
        while state.entries.len() > self.max_entries {
            match state.entries.shift_remove_index(0) {
                Some((old_key, _)) => evicted.push(old_key),
                None => break,
            }
        }
        state.stats.evictions += evicted.len() as u64;
        drop(state);
        self.logger.debug("Cache store", Some(&json!({"key": key})));
        for old_key in evicted {
            self.logger.debug("Cache evict", Some(&json!({"key": old_key})));
        }
    }

    pub fn store(&self, key: &str, payload: Payload, etag: Option<String>, now: Instant) {
        self.put(
            key,
            CacheEntry {
                payload,
                etag,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Pushes `expires_at` forward without touching the body. `None` when the
    /// entry has been evicted meanwhile.
    pub fn revalidate(&self, key: &str, now: Instant) -> Option<CacheEntry> {
        let mut state = self.lock();
        let mut entry = state.entries.shift_remove(key)?;
        entry.expires_at = now + self.ttl;
        state.entries.insert(key.to_string(), entry.clone());
        state.stats.revalidations += 1;
        drop(state);
        self.logger
            .debug("Cache revalidated", Some(&json!({"key": key})));
        Some(entry)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::logger::LogLevel;

    fn cache(ttl_ms: u64, max: usize) -> ResponseCache {
        ResponseCache::new(
            Logger::with_level("test", LogLevel::Error),
            Duration::from_millis(ttl_ms),
            max,
        )
    }

    #[test]
    fn key_ignores_credential_placement() {
        let with_query = Url::parse("https://api.test/w/A1?x=1&api-key=secret").unwrap();
        let without = Url::parse("https://api.test/w/A1?x=1").unwrap();
        assert_eq!(cache_key(&with_query, "api-key"), cache_key(&without, "api-key"));
        let other = Url::parse("https://api.test/w/B2?x=1").unwrap();
        assert_ne!(cache_key(&other, "api-key"), cache_key(&without, "api-key"));
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = cache(60_000, 2);
        let now = Instant::now();
        cache.store("a", Payload::text("A"), None, now);
        cache.store("b", Payload::text("B"), None, now);
        assert!(cache.get("a").is_some());
        cache.store("c", Payload::text("C"), None, now);
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn fresh_entries_hit_and_expired_entries_miss() {
        let cache = cache(1_000, 10);
        let now = Instant::now();
        cache.store("k", Payload::text("body"), None, now);
        assert!(matches!(cache.lookup("k", now), Lookup::Fresh(_)));
        let later = now + Duration::from_millis(1_000);
        assert_eq!(cache.lookup("k", later), Lookup::Miss);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn revalidation_refreshes_expiry_and_keeps_body() {
        let cache = cache(1_000, 10);
        let now = Instant::now();
        cache.store("k", Payload::from_body("{\"v\":1}"), Some("\"e1\"".to_string()), now);
        let later = now + Duration::from_millis(5_000);
        let stale = match cache.lookup("k", later) {
            Lookup::Stale(entry) => entry,
            other => panic!("expected stale, got {:?}", other),
        };
        let refreshed = cache.revalidate("k", later).unwrap();
        assert_eq!(refreshed.payload, stale.payload);
        assert_eq!(refreshed.etag.as_deref(), Some("\"e1\""));
        assert_eq!(refreshed.expires_at, later + Duration::from_millis(1_000));
        assert!(matches!(cache.lookup("k", later), Lookup::Fresh(_)));
        assert_eq!(cache.stats().revalidations, 1);
    }

    #[test]
    fn revalidate_missing_entry_is_none() {
        let cache = cache(1_000, 10);
        assert!(cache.revalidate("nope", Instant::now()).is_none());
    }

    #[test]
    fn zero_ttl_never_serves_fresh() {
        let cache = cache(0, 10);
        let now = Instant::now();
        cache.store("k", Payload::text("x"), None, now);
        assert_eq!(cache.lookup("k", now), Lookup::Miss);
    }
}
