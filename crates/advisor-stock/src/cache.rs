//! TTL caches for upstream payloads that several dimensions of one run ask
//! for (symbol directory, company profile, PSE EDGE ids)

use cached::{Cached, TimedCache};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: &'static str,
    pub endpoint: &'static str,
    /// Empty for endpoints that do not depend on a ticker
    pub symbol: String,
}

impl CacheKey {
    pub fn new(source: &'static str, endpoint: &'static str, symbol: impl Into<String>) -> Self {
        Self {
            source,
            endpoint,
            symbol: symbol.into(),
        }
    }
}

/// Shared fetch-through cache; clones see the same entries
pub struct ResponseCache<V> {
    entries: Arc<RwLock<TimedCache<CacheKey, V>>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Cached value, or the result of `fetch`
    ///
    /// Only `Ok(Some(_))` is remembered: "no data" and errors are asked
    /// again next time.
    pub async fn get_or_try_fetch<F, Fut, E>(&self, key: CacheKey, fetch: F) -> Result<Option<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
    {
        // TimedCache evicts expired entries on read, hence the write lock
        if let Some(hit) = self.entries.write().await.cache_get(&key).cloned() {
            tracing::debug!(
                source = key.source,
                endpoint = key.endpoint,
                symbol = %key.symbol,
                "cache hit"
            );
            return Ok(Some(hit));
        }

        let fetched = fetch().await?;
        if let Some(value) = &fetched {
            let _ = self.entries.write().await.cache_set(key, value.clone());
        }
        Ok(fetched)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.cache_size()
    }
}

impl<V> Clone for ResponseCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}
