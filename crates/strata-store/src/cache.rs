//! TTL cache fronting the durable store.
//!
//! Read-through composition happens at call sites via
//! [`CacheFirst::get_or_load`]; write-through means the durable store is
//! written first and the cache updated after (a crash in between leaves the
//! cache stale for at most one TTL window). When an external backend errors,
//! [`CacheFirst`] falls back to its in-process [`TtlMap`] with identical
//! semantics and logs the degradation once per outage.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::StoreError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One cached value with its expiry bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    pub written_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.written_at.elapsed() >= self.ttl
    }
}

/// External cache backend contract (a remote cache service, typically).
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<serde_json::Value>, StoreError>>;

    fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Remove entries matching `pattern`: exact key, or prefix when the
    /// pattern ends with `*`.
    fn invalidate(&self, pattern: &str) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// In-process TTL map; also the fallback when the external backend is down.
#[derive(Debug, Default)]
pub struct TtlMap {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl TtlMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;
        if entry.is_expired() {
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn put(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, e| !e.is_expired());
            entries.insert(
                key.to_owned(),
                CacheEntry {
                    value,
                    written_at: Instant::now(),
                    ttl,
                },
            );
        }
    }

    pub fn invalidate(&self, pattern: &str) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        if let Some(prefix) = pattern.strip_suffix('*') {
            entries.retain(|k, _| !k.starts_with(prefix));
        } else {
            entries.remove(pattern);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheBackend for TtlMap {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<serde_json::Value>, StoreError>> {
        let value = TtlMap::get(self, key);
        Box::pin(async move { Ok(value) })
    }

    fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        TtlMap::put(self, key, value, ttl);
        Box::pin(async move { Ok(()) })
    }

    fn invalidate(&self, pattern: &str) -> BoxFuture<'_, Result<(), StoreError>> {
        TtlMap::invalidate(self, pattern);
        Box::pin(async move { Ok(()) })
    }
}

/// Cache facade: external backend when configured and healthy, in-process
/// fallback otherwise.
pub struct CacheFirst {
    backend: Option<Box<dyn CacheBackend>>,
    local: TtlMap,
    default_ttl: Duration,
    outage: AtomicBool,
}

impl std::fmt::Debug for CacheFirst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheFirst")
            .field("external", &self.backend.is_some())
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl CacheFirst {
    #[must_use]
    pub fn new(backend: Option<Box<dyn CacheBackend>>, default_ttl: Duration) -> Self {
        Self {
            backend,
            local: TtlMap::new(),
            default_ttl,
            outage: AtomicBool::new(false),
        }
    }

    /// In-process only, no external backend.
    #[must_use]
    pub fn local_only(default_ttl: Duration) -> Self {
        Self::new(None, default_ttl)
    }

    fn note_outage(&self, err: &StoreError) {
        if !self.outage.swap(true, Ordering::SeqCst) {
            tracing::warn!("cache backend unreachable, falling back to in-process map: {err}");
        }
    }

    fn note_recovery(&self) {
        if self.outage.swap(false, Ordering::SeqCst) {
            tracing::info!("cache backend reachable again");
        }
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        if let Some(backend) = &self.backend {
            match backend.get(key).await {
                Ok(value) => {
                    self.note_recovery();
                    return value;
                }
                Err(e) => self.note_outage(&e),
            }
        }
        self.local.get(key)
    }

    pub async fn put(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if let Some(backend) = &self.backend {
            match backend.put(key, value.clone(), ttl).await {
                Ok(()) => {
                    self.note_recovery();
                    return;
                }
                Err(e) => self.note_outage(&e),
            }
        }
        self.local.put(key, value, ttl);
    }

    pub async fn invalidate(&self, pattern: &str) {
        if let Some(backend) = &self.backend
            && let Err(e) = backend.invalidate(pattern).await
        {
            self.note_outage(&e);
        }
        // The local map may hold entries written during an outage.
        self.local.invalidate(pattern);
    }

    /// Read-through: serve from cache, otherwise load from durable storage
    /// and populate the cache with the result.
    ///
    /// # Errors
    ///
    /// Propagates the loader's error on a cache miss.
    pub async fn get_or_load<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        load: F,
    ) -> Result<Option<serde_json::Value>, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<serde_json::Value>, StoreError>>,
    {
        if let Some(hit) = self.get(key).await {
            return Ok(Some(hit));
        }
        let loaded = load().await?;
        if let Some(value) = &loaded {
            self.put(key, value.clone(), ttl).await;
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenBackend;

    impl CacheBackend for BrokenBackend {
        fn get(&self, _key: &str) -> BoxFuture<'_, Result<Option<serde_json::Value>, StoreError>> {
            Box::pin(async { Err(StoreError::Other("backend down".into())) })
        }

        fn put(
            &self,
            _key: &str,
            _value: serde_json::Value,
            _ttl: Duration,
        ) -> BoxFuture<'_, Result<(), StoreError>> {
            Box::pin(async { Err(StoreError::Other("backend down".into())) })
        }

        fn invalidate(&self, _pattern: &str) -> BoxFuture<'_, Result<(), StoreError>> {
            Box::pin(async { Err(StoreError::Other("backend down".into())) })
        }
    }

    #[test]
    fn ttl_map_expires_entries() {
        let map = TtlMap::new();
        map.put("k", serde_json::json!(1), Duration::ZERO);
        assert!(map.get("k").is_none());

        map.put("k", serde_json::json!(2), Duration::from_secs(60));
        assert_eq!(map.get("k"), Some(serde_json::json!(2)));
    }

    #[test]
    fn ttl_map_prefix_invalidation() {
        let map = TtlMap::new();
        map.put("job:1", serde_json::json!("a"), Duration::from_secs(60));
        map.put("job:2", serde_json::json!("b"), Duration::from_secs(60));
        map.put("turn:1", serde_json::json!("c"), Duration::from_secs(60));

        map.invalidate("job:*");
        assert!(map.get("job:1").is_none());
        assert!(map.get("job:2").is_none());
        assert_eq!(map.get("turn:1"), Some(serde_json::json!("c")));
    }

    #[test]
    fn ttl_map_exact_invalidation() {
        let map = TtlMap::new();
        map.put("a", serde_json::json!(1), Duration::from_secs(60));
        map.put("ab", serde_json::json!(2), Duration::from_secs(60));

        map.invalidate("a");
        assert!(map.get("a").is_none());
        assert_eq!(map.get("ab"), Some(serde_json::json!(2)));
    }

    #[tokio::test]
    async fn broken_backend_falls_back_to_local() {
        let cache = CacheFirst::new(Some(Box::new(BrokenBackend)), Duration::from_secs(60));
        cache.put("k", serde_json::json!("v"), None).await;
        assert_eq!(cache.get("k").await, Some(serde_json::json!("v")));
    }

    #[tokio::test]
    async fn get_or_load_populates_on_miss() {
        let cache = CacheFirst::local_only(Duration::from_secs(60));

        let loaded = cache
            .get_or_load("k", None, || async { Ok(Some(serde_json::json!(42))) })
            .await
            .unwrap();
        assert_eq!(loaded, Some(serde_json::json!(42)));

        // Second call must hit the cache, not the loader.
        let loaded = cache
            .get_or_load("k", None, || async {
                Err(StoreError::Other("loader must not run".into()))
            })
            .await
            .unwrap();
        assert_eq!(loaded, Some(serde_json::json!(42)));
    }

    #[tokio::test]
    async fn get_or_load_propagates_loader_error() {
        let cache = CacheFirst::local_only(Duration::from_secs(60));
        let result = cache
            .get_or_load("missing", None, || async {
                Err::<Option<serde_json::Value>, _>(StoreError::Other("db down".into()))
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn get_or_load_does_not_cache_none() {
        let cache = CacheFirst::local_only(Duration::from_secs(60));
        let loaded = cache.get_or_load("k", None, || async { Ok(None) }).await.unwrap();
        assert!(loaded.is_none());
        assert!(cache.local.is_empty());
    }
}
