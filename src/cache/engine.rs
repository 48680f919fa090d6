//! The interception engine: cache-or-fetch-and-store around a [`Transport`].

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use super::{
    Backend, BackendError, CacheError, CacheKey, Clock, Entry, ExpirationPolicy, FileBackend,
    LruBackend, MemoryBackend, NeverExpire, NoopTelemetry, Payload, SystemClock, Telemetry, Ttl,
};
use crate::http::{Method, Request, Response, StatusCode};
use crate::transport::{BoxFuture, Transport, TransportError};

/// How many stored redirects a single lookup may follow.
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

/// Response headers kept alongside a cached body. Everything else is dropped.
pub const PRESERVED_HEADERS: &[&str] = &[
    "Content-Type",
    "Content-Encoding",
    "Content-Language",
    "ETag",
    "Last-Modified",
];

/// A [`Transport`] that answers `GET` requests from a [`Backend`] when it can
/// and records what the wrapped transport returns when it can not.
///
/// The engine keeps no per-request state; one instance can be shared (for
/// example behind an [`Arc`]) by any number of concurrent callers. Two racing
/// misses for the same URL both fetch, and the last write wins.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
/// use std::time::Duration;
/// use rttp_cache::cache::{CachingTransport, FixedTtl};
/// use rttp_cache::http::{Request, Response, StatusCode};
/// use rttp_cache::transport::{from_fn, Transport};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let origin = from_fn(|_req| async { Ok(Response::new(StatusCode::OK).body("hello")) });
/// let cached = CachingTransport::volatile(
///     origin,
///     FixedTtl::new(Duration::from_secs(60)),
///     NonZeroUsize::new(128).unwrap(),
/// );
///
/// let first = cached.send(Request::get("http://example.com/a")?).await?;
/// assert_eq!(&first.into_body().bytes().await?[..], b"hello");
///
/// let second = cached.send(Request::get("http://example.com/a")?).await?;
/// assert_eq!(second.status(), StatusCode::OK);
/// # Ok(())
/// # }
/// ```
pub struct CachingTransport<T> {
    inner: T,
    backend: Arc<dyn Backend>,
    policy: Arc<dyn ExpirationPolicy>,
    telemetry: Arc<dyn Telemetry>,
    clock: Arc<dyn Clock>,
    max_redirects: usize,
}

impl<T: Transport> CachingTransport<T> {
    /// Starts a builder with an unbounded in-memory backend, the
    /// [`NeverExpire`] policy, no telemetry and the system clock.
    pub fn builder(inner: T) -> CachingTransportBuilder<T> {
        CachingTransportBuilder::new(inner)
    }

    /// Caches to one file per URL under `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::CreateDir`] if `dir` can not be created.
    pub async fn persistent(
        inner: T,
        dir: impl Into<PathBuf>,
        policy: impl ExpirationPolicy + 'static,
    ) -> Result<Self, CacheError> {
        let backend = FileBackend::create(dir).await?;
        Ok(Self::builder(inner).backend(backend).policy(policy).build())
    }

    /// Caches in memory, keeping at most `max_items` entries.
    pub fn volatile(
        inner: T,
        policy: impl ExpirationPolicy + 'static,
        max_items: NonZeroUsize,
    ) -> Self {
        Self::builder(inner)
            .backend(LruBackend::new(max_items))
            .policy(policy)
            .build()
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// The storage backend entries are read from and written to.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Runs one request through the cache.
    ///
    /// # Errors
    ///
    /// - Any error of the wrapped transport, unchanged.
    /// - [`TransportError::Cache`] with [`CacheError::RedirectLimit`] when the
    ///   stored redirect chain is longer than the configured limit. The
    ///   transport is not called in that case.
    /// - [`TransportError::Body`] when the live body fails while being read
    ///   into the cache.
    pub async fn intercept(&self, mut request: Request) -> Result<Response, TransportError> {
        if *request.method() != Method::Get {
            self.telemetry.uncacheable(&request);
            return self.inner.send(request).await;
        }

        let target = match self.resolve(request.url()).await? {
            Lookup::Hit(response) => {
                self.telemetry.hit(&request);
                return Ok(response);
            }
            Lookup::Miss(target) => target,
        };

        self.telemetry.miss(&request);
        if &target != request.url() {
            debug!(from = %request.url(), to = %target, "fetching cached redirect target");
            request.set_url(target);
        }
        let response = self.inner.send(request.clone()).await?;

        if !is_cacheable(response.status()) {
            debug!(url = %request.url(), status = %response.status(), "response not cacheable");
            return Ok(response);
        }
        self.save(&request, response).await
    }

    /// Looks `url` up, following stored redirects.
    ///
    /// Absent, stale and unreadable entries are all a miss at the URL the
    /// walk had reached.
    async fn resolve(&self, url: &Url) -> Result<Lookup, CacheError> {
        let mut current = url.clone();

        for _ in 0..self.max_redirects {
            let key = CacheKey::from_url(&current);
            let entry = match self.backend.get(&key).await {
                Ok(entry) => entry,
                Err(BackendError::NotFound { .. }) => return Ok(Lookup::Miss(current)),
                Err(e) => {
                    debug!(key = %key, error = %e, "cache lookup failed");
                    return Ok(Lookup::Miss(current));
                }
            };

            if !entry.is_fresh(self.clock.now()) {
                debug!(key = %key, "cache entry is stale");
                return Ok(Lookup::Miss(current));
            }

            match entry.payload {
                Payload::RedirectTo(target) => {
                    debug!(from = %key, to = %target, "following cached redirect");
                    current = target;
                }
                Payload::Content { body, headers } => {
                    let len = body.len();
                    let response = Response::new(StatusCode::OK)
                        .with_headers(headers)
                        .header("Content-Length", len.to_string())
                        .body(body);
                    return Ok(Lookup::Hit(response));
                }
            }
        }

        Err(CacheError::RedirectLimit {
            url: url.to_string(),
            max_redirects: self.max_redirects,
        })
    }

    /// Records a cacheable live response and hands back an equivalent one.
    async fn save(&self, request: &Request, response: Response) -> Result<Response, TransportError> {
        let ttl = self.policy.evaluate(request, &response);
        if ttl.is_dont_cache() {
            debug!(url = %request.url(), "policy declined to cache response");
            return Ok(response);
        }

        let key = CacheKey::from_url(request.url());

        if response.status().is_redirection() {
            match response.location(request.url()) {
                Some(target) => self.persist(&key, Payload::RedirectTo(target), ttl).await,
                None => warn!(key = %key, "redirect without a usable Location header, not cached"),
            }
            return Ok(response);
        }

        let (status, mut headers, body) = response.into_parts();
        let body = body.bytes().await.map_err(TransportError::Body)?;

        let payload = Payload::Content {
            body: body.clone(),
            headers: headers.select(PRESERVED_HEADERS),
        };
        self.persist(&key, payload, ttl).await;

        headers.remove("transfer-encoding");
        headers.set("Content-Length", body.len().to_string());
        Ok(Response::new(status).with_headers(headers).body(body))
    }

    /// Best-effort write; failures are logged, never returned.
    async fn persist(&self, key: &CacheKey, payload: Payload, ttl: Ttl) {
        let entry = Entry::new(payload, self.clock.now(), ttl);
        match self.backend.put(key, entry).await {
            Ok(()) => debug!(key = %key, ttl = ?ttl, "response cached"),
            Err(e) => warn!(key = %key, error = %e, "failed to cache response"),
        }
    }
}

impl<T: Transport> Transport for CachingTransport<T> {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
        Box::pin(self.intercept(request))
    }
}

/// Outcome of walking the stored entries for a URL.
enum Lookup {
    Hit(Response),
    /// Nothing usable stored; the URL is where the redirect walk stopped.
    Miss(Url),
}

fn is_cacheable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::OK | StatusCode::MOVED_PERMANENTLY | StatusCode::TEMPORARY_REDIRECT
    )
}

/// Assembles a [`CachingTransport`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use rttp_cache::cache::{CachingTransport, MemoryBackend, NeverExpire, TracingTelemetry};
/// use rttp_cache::transport::TcpTransport;
///
/// let cached = CachingTransport::builder(TcpTransport::new())
///     .backend(MemoryBackend::new())
///     .policy(NeverExpire)
///     .telemetry(Arc::new(TracingTelemetry))
///     .max_redirects(5)
///     .build();
/// # drop(cached);
/// ```
pub struct CachingTransportBuilder<T> {
    inner: T,
    backend: Option<Arc<dyn Backend>>,
    policy: Arc<dyn ExpirationPolicy>,
    telemetry: Arc<dyn Telemetry>,
    clock: Arc<dyn Clock>,
    max_redirects: usize,
}

impl<T: Transport> CachingTransportBuilder<T> {
    fn new(inner: T) -> Self {
        Self {
            inner,
            backend: None,
            policy: Arc::new(NeverExpire),
            telemetry: Arc::new(NoopTelemetry),
            clock: Arc::new(SystemClock),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    #[must_use]
    pub fn backend(mut self, backend: impl Backend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: impl ExpirationPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    #[must_use]
    pub fn telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Maximum number of stored entries one lookup may visit.
    #[must_use]
    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn build(self) -> CachingTransport<T> {
        CachingTransport {
            inner: self.inner,
            backend: self
                .backend
                .unwrap_or_else(|| Arc::new(MemoryBackend::new())),
            policy: self.policy,
            telemetry: self.telemetry,
            clock: self.clock,
            max_redirects: self.max_redirects,
        }
    }
}
