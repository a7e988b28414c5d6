// Response cache for upstream reads, in-memory with per-entry expiry

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::CacheConfig;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
    #[error("Invalid TTL")]
    InvalidTTL,
}

#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    /// Removes every key starting with `prefix`, returning how many were dropped
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;
    async fn clear(&self) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Instant::now() >= expires_at,
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
    capacity: usize,
    default_ttl: Option<Duration>,
}

fn poisoned<T>(_: T) -> CacheError {
    CacheError::OperationFailed("cache lock poisoned".to_string())
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_capacity(usize::MAX)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
            default_ttl: None,
        }
    }

    /// Expiry applied when `set` is called without a TTL
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl).filter(|d| !d.is_zero());
        self
    }

    pub fn len(&self) -> usize {
        self.store.read().map(|store| store.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_entry(&self, key: &str) -> Result<Option<String>, CacheError> {
        {
            let store = self.store.read().map_err(poisoned)?;
            match store.get(key) {
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut store = self.store.write().map_err(poisoned)?;
        if store.get(key).map_or(false, CacheEntry::is_expired) {
            store.remove(key);
        }
        Ok(None)
    }

    fn set_entry(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        if ttl.map_or(false, |d| d.is_zero()) {
            return Err(CacheError::InvalidTTL);
        }

        let mut store = self.store.write().map_err(poisoned)?;
        if store.len() >= self.capacity && !store.contains_key(key) {
            store.retain(|_, entry| !entry.is_expired());
            if store.len() >= self.capacity {
                // Evict the entry closest to expiry
                let victim = store
                    .iter()
                    .min_by_key(|(_, entry)| (entry.expires_at.is_none(), entry.expires_at))
                    .map(|(k, _)| k.clone());
                if let Some(victim) = victim {
                    store.remove(&victim);
                }
            }
        }
        store.insert(
            key.to_string(),
            CacheEntry::new(value.to_string(), ttl.or(self.default_ttl)),
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.get_entry(key)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.set_entry(key, value, ttl)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut store = self.store.write().map_err(poisoned)?;
        store.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut store = self.store.write().map_err(poisoned)?;
        let before = store.len();
        store.retain(|key, _| !key.starts_with(prefix));
        Ok(before - store.len())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let store = self.store.read().map_err(poisoned)?;
        Ok(store.get(key).map_or(false, |entry| !entry.is_expired()))
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut store = self.store.write().map_err(poisoned)?;
        store.clear();
        Ok(())
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Backend used when caching is switched off: every read misses
#[derive(Debug, Clone, Default)]
pub struct NoopCache;

#[async_trait::async_trait]
impl CacheBackend for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete_prefix(&self, _prefix: &str) -> Result<usize, CacheError> {
        Ok(0)
    }

    async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

pub struct CacheFactory;

impl CacheFactory {
    pub fn create_cache(config: &CacheConfig) -> Arc<dyn CacheBackend> {
        if !config.enabled {
            tracing::info!("Response cache disabled; all reads go upstream");
            return Arc::new(NoopCache);
        }

        Arc::new(InMemoryCache::with_capacity(config.capacity).with_default_ttl(config.default_ttl()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let cache = InMemoryCache::new();
        cache
            .set("coa:{}", "[1,2]", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(cache.get("coa:{}").await.unwrap().as_deref(), Some("[1,2]"));
        assert!(cache.exists("coa:{}").await.unwrap());
    }

    #[tokio::test]
    async fn expired_entries_are_dropped_on_read() {
        let cache = InMemoryCache::new();
        cache
            .set("journal_entry:1", "{}", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get("journal_entry:1").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn delete_prefix_only_touches_matching_keys() {
        let cache = InMemoryCache::new();
        for key in ["coa:{}", "coa:{\"type\":\"ASSET\"}", "account_balance:1000:current"] {
            cache.set(key, "x", None).await.unwrap();
        }

        let removed = cache.delete_prefix("coa:").await.unwrap();

        assert_eq!(removed, 2);
        assert!(cache.exists("account_balance:1000:current").await.unwrap());
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected() {
        let cache = InMemoryCache::new();
        let result = cache.set("k", "v", Some(Duration::ZERO)).await;
        assert!(matches!(result, Err(CacheError::InvalidTTL)));
    }

    #[tokio::test]
    async fn capacity_evicts_soonest_expiring_entry() {
        let cache = InMemoryCache::with_capacity(2);
        cache.set("a", "1", Some(Duration::from_secs(10))).await.unwrap();
        cache.set("b", "2", Some(Duration::from_secs(600))).await.unwrap();
        cache.set("c", "3", Some(Duration::from_secs(600))).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(!cache.exists("a").await.unwrap());
        assert!(cache.exists("c").await.unwrap());
    }

    #[tokio::test]
    async fn entries_without_ttl_use_the_default() {
        let cache = InMemoryCache::new().with_default_ttl(Duration::from_millis(20));
        cache.set("risks:list:{}", "[]", None).await.unwrap();
        assert!(cache.exists("risks:list:{}").await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!cache.exists("risks:list:{}").await.unwrap());
    }

    #[tokio::test]
    async fn disabled_cache_never_hits() {
        let cache = CacheFactory::create_cache(&CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        });
        cache.set("k", "v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
