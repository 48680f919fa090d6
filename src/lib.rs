//! # rttp-cache
//!
//! A transparent response cache for async HTTP/1.1 client transports.
//!
//! [`CachingTransport`] wraps any [`Transport`] and serves `GET` requests from a
//! pluggable storage [`Backend`](cache::Backend) while entries are fresh, as
//! decided by a pluggable [`ExpirationPolicy`](cache::ExpirationPolicy).
//! Everything else goes straight to the wrapped transport.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use rttp_cache::cache::{CachingTransport, FixedTtl};
//! use rttp_cache::http::Request;
//! use rttp_cache::transport::{TcpTransport, Transport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CachingTransport::persistent(
//!         TcpTransport::new(),
//!         "./http-cache",
//!         FixedTtl::new(Duration::from_secs(300)),
//!     )
//!     .await?;
//!
//!     let response = client.send(Request::get("http://example.com/")?).await?;
//!     println!("{}", response.status());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod http;
pub mod transport;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheConfig, CacheError, CachingTransport};
pub use http::{Body, Headers, Method, Request, Response, StatusCode};
pub use transport::{TcpTransport, Transport, TransportError};
