//! Answer cache with at-most-one concurrent computation per key.
//!
//! Entries live in an `LruCache`; the configured policy decides whether it is
//! bounded (`lru`), unbounded (`none`) or unbounded with expiry on read
//! (`ttl`). In-flight computations are tracked in a keyed lock table: the
//! first caller for a key computes while later callers wait on the same lock
//! and then read what was stored.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use ragchat_core::config::EvictionSettings;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub answer: String,
    pub latency_seconds: f64,
    pub sources: Vec<String>,
    inserted_at: Instant,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, answer: impl Into<String>, latency_seconds: f64, sources: Vec<String>) -> Self {
        Self { key: key.into(), answer: answer.into(), latency_seconds, sources, inserted_at: Instant::now() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct ResponseCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(&EvictionSettings::None)
    }
}

impl ResponseCache {
    pub fn new(policy: &EvictionSettings) -> Self {
        let (entries, ttl) = match policy {
            EvictionSettings::None => (LruCache::unbounded(), None),
            EvictionSettings::Lru { capacity } => match NonZeroUsize::new(*capacity) {
                Some(cap) => (LruCache::new(cap), None),
                None => (LruCache::unbounded(), None),
            },
            EvictionSettings::Ttl { ttl_seconds } => (LruCache::unbounded(), Some(Duration::from_secs(*ttl_seconds))),
        };
        Self {
            entries: Mutex::new(entries),
            inflight: Mutex::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut entries = self.entries.lock().await;
        let expired = match (self.ttl, entries.peek(key)) {
            (Some(ttl), Some(e)) => e.inserted_at.elapsed() > ttl,
            _ => false,
        };
        if expired {
            entries.pop(key);
            debug!(key, "cache entry expired");
            return None;
        }
        entries.get(key).cloned()
    }

    pub async fn put(&self, key: &str, entry: CacheEntry) {
        self.entries.lock().await.put(key.to_string(), entry);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len().await,
        }
    }

    /// Returns the cached entry for `key`, or runs `compute` and stores its
    /// result. Concurrent callers for one key share a single computation;
    /// a failed computation stores nothing and the next waiter retries.
    ///
    /// The flag is `true` when the entry came from the cache.
    pub async fn get_or_try_compute<F, E>(&self, key: &str, compute: F) -> Result<(CacheEntry, bool), E>
    where
        F: Future<Output = Result<CacheEntry, E>>,
    {
        if let Some(hit) = self.get(key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok((hit, true));
        }

        let slot = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(inflight.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))))
        };
        let guard = slot.lock().await;

        // Another caller may have filled the entry while we waited.
        if let Some(hit) = self.get(key).await {
            drop(guard);
            self.release(key, slot).await;
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok((hit, true));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let result = compute.await;
        if let Ok(entry) = &result {
            self.put(key, entry.clone()).await;
        }
        drop(guard);
        self.release(key, slot).await;
        result.map(|entry| (entry, false))
    }

    async fn release(&self, key: &str, slot: Arc<Mutex<()>>) {
        let mut inflight = self.inflight.lock().await;
        // One reference in the table plus ours: nobody else is waiting.
        let last = Arc::strong_count(&slot) <= 2;
        drop(slot);
        if last {
            inflight.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, answer: &str) -> CacheEntry {
        CacheEntry::new(key, answer, 0.5, Vec::new())
    }

    #[tokio::test]
    async fn lru_policy_evicts_least_recent() {
        let cache = ResponseCache::new(&EvictionSettings::Lru { capacity: 2 });
        cache.put("a", entry("a", "1")).await;
        cache.put("b", entry("b", "2")).await;
        assert!(cache.get("a").await.is_some());
        cache.put("c", entry("c", "3")).await;
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("a").await.is_some());
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn ttl_policy_expires_on_read() {
        let cache = ResponseCache::new(&EvictionSettings::Ttl { ttl_seconds: 1 });
        let mut old = entry("k", "stale");
        old.inserted_at = Instant::now().checked_sub(Duration::from_secs(5)).unwrap();
        cache.put("k", old).await;
        assert!(cache.get("k").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn failed_compute_stores_nothing() {
        let cache = ResponseCache::default();
        let res: Result<_, &str> = cache.get_or_try_compute("k", async { Err("boom") }).await;
        assert!(res.is_err());
        assert!(cache.is_empty().await);

        let (e, hit) = cache.get_or_try_compute::<_, &str>("k", async { Ok(entry("k", "ok")) }).await.unwrap();
        assert!(!hit);
        assert_eq!(e.answer, "ok");
        let (_, hit) = cache.get_or_try_compute::<_, &str>("k", async { Ok(entry("k", "other")) }).await.unwrap();
        assert!(hit);
        assert_eq!(cache.stats().await, CacheStats { hits: 1, misses: 2, entries: 1 });
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_computation() {
        let cache = Arc::new(ResponseCache::default());
        let calls = Arc::new(AtomicU64::new(0));
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            tasks.push(tokio::spawn(async move {
                cache
                    .get_or_try_compute::<_, ()>("same", async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(entry("same", "answer"))
                    })
                    .await
            }));
        }
        for t in tasks {
            let (e, _) = t.await.unwrap().unwrap();
            assert_eq!(e.answer, "answer");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.inflight.lock().await.is_empty());
    }
}
