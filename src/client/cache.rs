//! Request cache keyed by request signature.
//!
//! A key is the endpoint plus its full query string, e.g.
//! `/products?page=1&limit=10`. Concurrent fetches of the same key share one
//! request and a finished fetch is served from memory until the endpoint is
//! invalidated. Failed fetches are never stored.

use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;

/// Entries kept per cache before the least used are evicted.
pub const DEFAULT_CAPACITY: u64 = 256;

/// `endpoint?query`, or just `endpoint` when the query is empty.
pub fn cache_key(endpoint: &str, query: &str) -> String {
    if query.is_empty() {
        endpoint.to_string()
    } else {
        format!("{}?{}", endpoint, query)
    }
}

#[derive(Clone)]
pub struct QueryCache<V> {
    entries: Cache<String, V>,
}

impl<V> QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .support_invalidation_closures()
            .build();
        Self { entries }
    }

    /// Cached value for `key`, or the result of `fetch`. Callers racing on the
    /// same key wait for a single fetch. An error is handed to every waiter
    /// and leaves the key empty.
    pub async fn get_or_fetch<F, E>(&self, key: String, fetch: F) -> Result<V, Arc<E>>
    where
        F: Future<Output = Result<V, E>>,
        E: Send + Sync + 'static,
    {
        self.entries.try_get_with(key, fetch).await
    }

    pub async fn peek(&self, key: &str) -> Option<V> {
        self.entries.get(key).await
    }

    /// Drop every key of `endpoint`, whatever its query string.
    pub fn invalidate(&self, endpoint: &str) {
        let exact = endpoint.to_string();
        let prefix = format!("{}?", endpoint);
        let result = self
            .entries
            .invalidate_entries_if(move |key, _| key == &exact || key.starts_with(&prefix));
        if let Err(e) = result {
            tracing::warn!("Selective invalidation of {} failed, clearing cache: {}", endpoint, e);
            self.entries.invalidate_all();
        }
    }

    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    /// Number of stored entries once pending maintenance has run.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }
}

impl<V> Default for QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_cache_key_includes_query() {
        assert_eq!(cache_key("/products", "page=1&limit=10"), "/products?page=1&limit=10");
        assert_eq!(cache_key("/categories", ""), "/categories");
    }

    #[tokio::test]
    async fn test_identical_keys_share_one_fetch() {
        let cache: QueryCache<Vec<u32>> = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = |calls: Arc<AtomicUsize>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, String>(vec![1, 2, 3])
        };

        let key = cache_key("/products", "page=1&limit=10");
        let (a, b) = tokio::join!(
            cache.get_or_fetch(key.clone(), fetch(calls.clone())),
            cache.get_or_fetch(key.clone(), fetch(calls.clone())),
        );
        assert_eq!(a.unwrap(), vec![1, 2, 3]);
        assert_eq!(b.unwrap(), vec![1, 2, 3]);

        let c = cache.get_or_fetch(key, fetch(calls.clone())).await;
        assert_eq!(c.unwrap(), vec![1, 2, 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: QueryCache<u32> = QueryCache::default();
        let failed = cache
            .get_or_fetch("/orders".to_string(), async { Err::<u32, _>("offline") })
            .await;
        assert_eq!(*failed.unwrap_err(), "offline");
        assert!(cache.peek("/orders").await.is_none());

        let ok = cache
            .get_or_fetch("/orders".to_string(), async { Ok::<_, &str>(7) })
            .await;
        assert_eq!(ok.unwrap(), 7);
        assert_eq!(cache.peek("/orders").await, Some(7));
    }

    #[tokio::test]
    async fn test_invalidate_drops_only_that_endpoint() {
        let cache: QueryCache<u32> = QueryCache::default();
        for (key, value) in [
            ("/products?page=1&limit=10", 1),
            ("/products?page=2&limit=10", 2),
            ("/products", 3),
            ("/products-archive", 4),
            ("/categories", 5),
        ] {
            let _ = cache
                .get_or_fetch(key.to_string(), async move { Ok::<_, ()>(value) })
                .await;
        }
        assert_eq!(cache.len().await, 5);

        cache.invalidate("/products");
        assert!(cache.peek("/products?page=1&limit=10").await.is_none());
        assert!(cache.peek("/products?page=2&limit=10").await.is_none());
        assert!(cache.peek("/products").await.is_none());
        assert_eq!(cache.peek("/products-archive").await, Some(4));
        assert_eq!(cache.peek("/categories").await, Some(5));
    }

    #[tokio::test]
    async fn test_refetch_after_invalidation() {
        let cache: QueryCache<u32> = QueryCache::default();
        let first = cache
            .get_or_fetch("/categories".to_string(), async { Ok::<_, ()>(1) })
            .await;
        assert_eq!(first.unwrap(), 1);

        cache.invalidate_all();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = cache
            .get_or_fetch("/categories".to_string(), async { Ok::<_, ()>(2) })
            .await;
        assert_eq!(second.unwrap(), 2);
    }
}
