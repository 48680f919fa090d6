//! Hit / miss / uncacheable notifications.
//!
//! Telemetry is fire-and-forget: sinks observe requests and can not change
//! what the engine does.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::http::Request;

/// Receives one notification per intercepted request.
///
/// Every method defaults to a no-op so sinks only implement what they need.
pub trait Telemetry: Send + Sync {
    /// Served from the cache; the transport was not called.
    fn hit(&self, _request: &Request) {}

    /// Not servable from the cache; the transport is about to be called.
    fn miss(&self, _request: &Request) {}

    /// Not a `GET`; passed straight to the transport.
    fn uncacheable(&self, _request: &Request) {}
}

impl<T: Telemetry + ?Sized> Telemetry for Arc<T> {
    fn hit(&self, request: &Request) {
        (**self).hit(request)
    }

    fn miss(&self, request: &Request) {
        (**self).miss(request)
    }

    fn uncacheable(&self, request: &Request) {
        (**self).uncacheable(request)
    }
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {}

/// Emits each notification as a `tracing` debug event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn hit(&self, request: &Request) {
        debug!(url = %request.url(), "cache hit");
    }

    fn miss(&self, request: &Request) {
        debug!(url = %request.url(), "cache miss");
    }

    fn uncacheable(&self, request: &Request) {
        debug!(method = %request.method(), url = %request.url(), "request not cacheable");
    }
}

/// Counts notifications.
#[derive(Debug, Default)]
pub struct TelemetryCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    uncacheable: AtomicU64,
}

impl TelemetryCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn uncacheable_count(&self) -> u64 {
        self.uncacheable.load(Ordering::Relaxed)
    }
}

impl Telemetry for TelemetryCounters {
    fn hit(&self, _request: &Request) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self, _request: &Request) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn uncacheable(&self, _request: &Request) {
        self.uncacheable.fetch_add(1, Ordering::Relaxed);
    }
}
