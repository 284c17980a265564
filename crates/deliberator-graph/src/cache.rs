//! Two-level retrieval cache.
//!
//! L1 is the query cache: `(question, threshold, max_results) -> scored decision
//! ids`, LRU-bounded and TTL-bounded, cleared on every new graph write. L2 is a
//! content-addressed embedding cache with no TTL — content-addressing means a
//! cached embedding never goes stale, so L1 invalidation never needs to touch
//! it. No embedding backend is wired up yet (see `deliberator-similarity`), so
//! `EmbeddingCache` currently has no caller; it exists so a future
//! `SimilarityBackend` can slot into this cache without a retriever change.

use deliberator_core::DecisionId;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Default L1 TTL: 5 minutes.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
/// Default L1 capacity: 200 entries.
pub const DEFAULT_CACHE_CAPACITY: usize = 200;

struct Entry {
    scored_ids: Vec<(DecisionId, f64)>,
    expires_at: Instant,
}

/// L1 query cache keyed by `(question, threshold, max_results)`.
pub struct QueryCache {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl QueryCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Build the cache key for a retrieval query.
    pub fn key(question: &str, threshold: f64, max_results: u32) -> String {
        format!("{question}\u{1}{threshold:.4}\u{1}{max_results}")
    }

    /// Fetch a cached scored-id list, if present and unexpired.
    pub async fn get(&self, key: &str) -> Option<Vec<(DecisionId, f64)>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.scored_ids.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub async fn put(&self, key: String, scored_ids: Vec<(DecisionId, f64)>) {
        let mut entries = self.entries.lock().await;
        entries.put(
            key,
            Entry {
                scored_ids,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drop every cached query. Called after every new decision-graph write
    /// so reads observe the write (read-your-writes).
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }
}

/// Content-addressed embedding cache. No TTL: the key is a hash of the
/// content itself, so a hit can never be stale.
pub struct EmbeddingCache {
    entries: Mutex<std::collections::HashMap<String, Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(std::collections::HashMap::new()),
        }
    }

    pub fn content_key(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub async fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.entries.lock().await.get(&Self::content_key(text)).cloned()
    }

    pub async fn put(&self, text: &str, embedding: Vec<f32>) {
        self.entries
            .lock()
            .await
            .insert(Self::content_key(text), embedding);
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn query_cache_round_trips_within_ttl() {
        let cache = QueryCache::new(10, Duration::from_secs(60));
        let key = QueryCache::key("q", 0.4, 10);
        let id = DecisionId::new();
        cache.put(key.clone(), vec![(id, 0.9)]).await;

        let hit = cache.get(&key).await.unwrap();
        assert_eq!(hit, vec![(id, 0.9)]);
    }

    #[tokio::test]
    async fn query_cache_expires_after_ttl() {
        let cache = QueryCache::new(10, Duration::from_millis(1));
        let key = QueryCache::key("q", 0.4, 10);
        cache.put(key.clone(), vec![(DecisionId::new(), 0.9)]).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn query_cache_clear_drops_everything() {
        let cache = QueryCache::new(10, Duration::from_secs(60));
        let key = QueryCache::key("q", 0.4, 10);
        cache.put(key.clone(), vec![(DecisionId::new(), 0.9)]).await;

        cache.clear().await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn embedding_cache_is_content_addressed() {
        let cache = EmbeddingCache::new();
        cache.put("hello world", vec![0.1, 0.2]).await;

        assert_eq!(cache.get("hello world").await, Some(vec![0.1, 0.2]));
        assert_eq!(cache.get("something else").await, None);
    }
}
