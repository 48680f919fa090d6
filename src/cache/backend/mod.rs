//! Storage backends — the `get` / `put` seam behind the caching engine.
//!
//! Backends only store and return [`Entry`] values; freshness, redirects and
//! eviction policy decisions beyond their own capacity belong to the engine.

use std::sync::Arc;

use thiserror::Error;

use crate::transport::BoxFuture;

use super::{CacheKey, Entry};

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::{LruBackend, MemoryBackend};

/// Errors returned by a [`Backend`].
#[derive(Debug, Error)]
pub enum BackendError {
    /// Nothing usable is stored under the key. Also covers records that
    /// exist but can not be read back.
    #[error("no cache entry for {key}")]
    NotFound { key: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
}

impl BackendError {
    pub(crate) fn not_found(key: &CacheKey) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }
}

/// Key → [`Entry`] storage.
///
/// # Contract
///
/// - `put` replaces any existing entry for the key wholesale.
/// - `get` returns [`BackendError::NotFound`] for absent keys; it does not
///   check freshness.
/// - Implementations **must** be `Send + Sync`; one backend is shared by all
///   concurrent requests.
pub trait Backend: Send + Sync {
    fn get<'a>(&'a self, key: &'a CacheKey) -> BoxFuture<'a, Result<Entry, BackendError>>;

    fn put<'a>(&'a self, key: &'a CacheKey, entry: Entry) -> BoxFuture<'a, Result<(), BackendError>>;
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn get<'a>(&'a self, key: &'a CacheKey) -> BoxFuture<'a, Result<Entry, BackendError>> {
        (**self).get(key)
    }

    fn put<'a>(&'a self, key: &'a CacheKey, entry: Entry) -> BoxFuture<'a, Result<(), BackendError>> {
        (**self).put(key, entry)
    }
}
