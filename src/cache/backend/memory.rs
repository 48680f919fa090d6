//! In-process backends: an unbounded map and a recency-bounded LRU.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use lru::LruCache;
use tokio::sync::{Mutex, RwLock};
use tracing::trace;

use super::{Backend, BackendError};
use crate::cache::{CacheKey, Entry};
use crate::transport::BoxFuture;

/// An unbounded map. Nothing is ever evicted, so it suits short-lived
/// processes.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<CacheKey, Entry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Backend for MemoryBackend {
    fn get<'a>(&'a self, key: &'a CacheKey) -> BoxFuture<'a, Result<Entry, BackendError>> {
        Box::pin(async move {
            self.entries
                .read()
                .await
                .get(key)
                .cloned()
                .ok_or_else(|| BackendError::not_found(key))
        })
    }

    fn put<'a>(&'a self, key: &'a CacheKey, entry: Entry) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            self.entries.write().await.insert(key.clone(), entry);
            Ok(())
        })
    }
}

/// Holds at most `capacity` entries, evicting the least recently used one.
///
/// Reads update recency, so a single exclusive lock guards both `get` and
/// `put`. Capacity is fixed at construction.
#[derive(Debug)]
pub struct LruBackend {
    entries: Mutex<LruCache<CacheKey, Entry>>,
}

impl LruBackend {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn capacity(&self) -> NonZeroUsize {
        self.entries.lock().await.cap()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl Backend for LruBackend {
    fn get<'a>(&'a self, key: &'a CacheKey) -> BoxFuture<'a, Result<Entry, BackendError>> {
        Box::pin(async move {
            self.entries
                .lock()
                .await
                .get(key)
                .cloned()
                .ok_or_else(|| BackendError::not_found(key))
        })
    }

    fn put<'a>(&'a self, key: &'a CacheKey, entry: Entry) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            let evicted = self.entries.lock().await.push(key.clone(), entry);
            if let Some((old, _)) = evicted.filter(|(old, _)| old != key) {
                trace!(evicted = %old, "lru capacity reached");
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use bytes::Bytes;
    use url::Url;

    use super::*;
    use crate::cache::{Payload, Ttl};
    use crate::http::Headers;

    fn key(n: usize) -> CacheKey {
        CacheKey::from_url(&Url::parse(&format!("http://example.com/{n}")).unwrap())
    }

    fn entry(body: &str) -> Entry {
        Entry::new(
            Payload::Content {
                body: Bytes::from(body.to_owned()),
                headers: Headers::new(),
            },
            SystemTime::now(),
            Ttl::Forever,
        )
    }

    #[tokio::test]
    async fn memory_backend_never_evicts() {
        let backend = MemoryBackend::new();
        for n in 0..1_000 {
            backend.put(&key(n), entry("x")).await.unwrap();
        }
        assert_eq!(backend.len().await, 1_000);
        assert!(backend.get(&key(0)).await.is_ok());
    }

    #[tokio::test]
    async fn memory_backend_missing_key() {
        let backend = MemoryBackend::new();
        assert!(backend.is_empty().await);
        assert!(matches!(backend.get(&key(1)).await, Err(BackendError::NotFound { .. })));
    }

    #[tokio::test]
    async fn lru_evicts_least_recently_inserted() {
        let backend = LruBackend::new(NonZeroUsize::new(3).unwrap());
        for n in 0..4 {
            backend.put(&key(n), entry(&n.to_string())).await.unwrap();
        }

        assert_eq!(backend.len().await, 3);
        assert!(matches!(backend.get(&key(0)).await, Err(BackendError::NotFound { .. })));
        for n in 1..4 {
            assert!(backend.get(&key(n)).await.is_ok());
        }
    }

    #[tokio::test]
    async fn lru_get_refreshes_recency() {
        let backend = LruBackend::new(NonZeroUsize::new(2).unwrap());
        backend.put(&key(0), entry("zero")).await.unwrap();
        backend.put(&key(1), entry("one")).await.unwrap();

        // touching 0 makes 1 the eviction candidate
        backend.get(&key(0)).await.unwrap();
        backend.put(&key(2), entry("two")).await.unwrap();

        assert!(backend.get(&key(0)).await.is_ok());
        assert!(matches!(backend.get(&key(1)).await, Err(BackendError::NotFound { .. })));
        assert!(backend.get(&key(2)).await.is_ok());
    }

    #[tokio::test]
    async fn lru_overwrite_does_not_evict() {
        let backend = LruBackend::new(NonZeroUsize::new(2).unwrap());
        backend.put(&key(0), entry("a")).await.unwrap();
        backend.put(&key(1), entry("b")).await.unwrap();
        backend.put(&key(0), entry("c")).await.unwrap();

        assert_eq!(backend.len().await, 2);
        assert!(backend.get(&key(1)).await.is_ok());
        match backend.get(&key(0)).await.unwrap().payload {
            Payload::Content { body, .. } => assert_eq!(&body[..], b"c"),
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
