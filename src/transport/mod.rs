//! Outbound transports — the single-exchange `send(request) -> response` seam.
//!
//! ## Core types
//!
//! - [`Transport`] — trait implemented by everything that can perform one
//!   HTTP exchange. The caching layer both consumes and implements it.
//! - [`TcpTransport`] — a minimal HTTP/1.1 client over Tokio TCP streams.
//! - [`FnTransport`] / [`from_fn`] — adapts an async closure into a transport.
//! - [`TransportError`] — everything a caller of [`Transport::send`] can see.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::cache::CacheError;
use crate::http::{Request, Response, ResponseError};

mod tcp;

pub use tcp::TcpTransport;

/// A pinned, boxed, `Send` future — the return type of object-safe async seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors produced while performing an exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported URL scheme `{scheme}`")]
    UnsupportedScheme { scheme: String },

    #[error("URL has no host: {url}")]
    MissingHost { url: String },

    #[error("malformed response: {0}")]
    Response(#[from] ResponseError),

    #[error("malformed chunked response body")]
    Chunked,

    #[error("response exceeds maximum allowed size of {max_bytes} bytes")]
    TooLarge { max_bytes: usize },

    #[error("exchange timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to read response body: {0}")]
    Body(#[source] std::io::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Something that can perform a single HTTP exchange.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync`; one transport is shared by
///   every caller.
/// - `send` takes the request by value and resolves to the full response
///   head; the body may still be streaming.
/// - Retries, timeouts and connection reuse are the implementation's own
///   business.
pub trait Transport: Send + Sync {
    /// Performs one exchange.
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
        (**self).send(request)
    }
}

/// A [`Transport`] backed by an async closure. Built with [`from_fn`].
pub struct FnTransport<F> {
    f: F,
}

/// Wraps `f` as a [`Transport`].
///
/// # Examples
///
/// ```
/// use rttp_cache::http::{Response, StatusCode};
/// use rttp_cache::transport::{from_fn, Transport};
///
/// let transport = from_fn(|_req| async { Ok(Response::new(StatusCode::NO_CONTENT)) });
/// # let _: &dyn Transport = &transport;
/// ```
pub fn from_fn<F, Fut>(f: F) -> FnTransport<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, TransportError>> + Send + 'static,
{
    FnTransport { f }
}

impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, TransportError>> + Send + 'static,
{
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
        Box::pin((self.f)(request))
    }
}
