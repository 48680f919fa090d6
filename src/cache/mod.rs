//! Caching layer — a [`Transport`](crate::transport::Transport) decorator that
//! serves stored responses and records fresh ones.
//!
//! ## Core types
//!
//! - [`CachingTransport`] — the interception engine. Wraps a transport, gates
//!   every request through cache-or-fetch-and-store, and implements
//!   [`Transport`](crate::transport::Transport) itself.
//! - [`Backend`] — the `get` / `put` storage seam, with [`FileBackend`],
//!   [`MemoryBackend`] and [`LruBackend`] implementations.
//! - [`ExpirationPolicy`] — computes an entry's [`Ttl`] when it is written:
//!   [`NeverExpire`], [`FixedTtl`], [`PerHostTtl`].
//! - [`Telemetry`] — optional hit / miss / uncacheable notifications.
//! - [`CacheConfig`] — JSON-deserializable construction settings.
//!
//! ## Rules
//!
//! - Only `GET` requests consult or populate the cache.
//! - Only `200 OK`, `301 Moved Permanently` and `307 Temporary Redirect`
//!   responses are stored. Redirects are stored as pointers to their target
//!   and followed through the cache on later lookups; the live path never
//!   follows them.
//! - Freshness is decided by the TTL the policy assigned at write time, never
//!   by response cache-control headers.
//! - Failing to store an entry never fails the request.

use std::path::PathBuf;

use thiserror::Error;

pub mod backend;
pub mod clock;
pub mod config;
pub mod engine;
pub mod entry;
pub mod key;
pub mod policy;
pub mod telemetry;

pub use backend::{Backend, BackendError, FileBackend, LruBackend, MemoryBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, StorageConfig, TtlConfig};
pub use engine::{CachingTransport, CachingTransportBuilder, DEFAULT_MAX_REDIRECTS, PRESERVED_HEADERS};
pub use entry::{Entry, Payload, Ttl};
pub use key::CacheKey;
pub use policy::{ExpirationPolicy, FixedTtl, NeverExpire, PerHostTtl};
pub use telemetry::{NoopTelemetry, Telemetry, TelemetryCounters, TracingTelemetry};

/// Errors raised by the caching layer itself.
///
/// Lookup problems (absent, stale or undecodable entries) are never errors;
/// they are misses. Of the lookup path only an over-long stored redirect chain
/// reaches the caller.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cached redirect chain from {url} exceeded {max_redirects} hops")]
    RedirectLimit { url: String, max_redirects: usize },

    #[error("failed to create cache directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse cache configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),
}
