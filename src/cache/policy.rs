//! Expiration policies — how long a freshly fetched response stays cached.
//!
//! A policy is consulted exactly once per write, after the live fetch and
//! before the entry is stored. Returning [`Ttl::DontCache`] suppresses the
//! write.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::http::{Request, Response};

use super::Ttl;

/// Maps an observed response to the [`Ttl`] of the entry that will hold it.
///
/// `request` is the request that produced `response`; for a redirect it is
/// the redirecting request, not its target.
pub trait ExpirationPolicy: Send + Sync {
    fn evaluate(&self, request: &Request, response: &Response) -> Ttl;
}

impl<P: ExpirationPolicy + ?Sized> ExpirationPolicy for Arc<P> {
    fn evaluate(&self, request: &Request, response: &Response) -> Ttl {
        (**self).evaluate(request, response)
    }
}

impl<P: ExpirationPolicy + ?Sized> ExpirationPolicy for Box<P> {
    fn evaluate(&self, request: &Request, response: &Response) -> Ttl {
        (**self).evaluate(request, response)
    }
}

/// Caches everything forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverExpire;

impl ExpirationPolicy for NeverExpire {
    fn evaluate(&self, _request: &Request, _response: &Response) -> Ttl {
        Ttl::Forever
    }
}

/// The same TTL for every response.
#[derive(Debug, Clone, Copy)]
pub struct FixedTtl {
    ttl: Ttl,
}

impl FixedTtl {
    /// A zero `ttl` disables caching.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl: ttl.into() }
    }

    pub fn from_ttl(ttl: Ttl) -> Self {
        Self { ttl }
    }
}

impl ExpirationPolicy for FixedTtl {
    fn evaluate(&self, _request: &Request, _response: &Response) -> Ttl {
        self.ttl
    }
}

/// Per-host TTLs with a default, adjustable while in use.
///
/// Hosts are matched exactly: `api.example.com` and `example.com` are two
/// unrelated entries.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use rttp_cache::cache::{PerHostTtl, Ttl};
///
/// let policy = Arc::new(PerHostTtl::new(Ttl::Expires(Duration::from_secs(60))));
/// policy.set_ttl("static.example.com", Ttl::Forever);
/// policy.set_ttl("live.example.com", Ttl::DontCache);
/// assert_eq!(policy.ttl_for("static.example.com"), Ttl::Forever);
/// assert_eq!(policy.ttl_for("example.com"), Ttl::Expires(Duration::from_secs(60)));
/// ```
#[derive(Debug)]
pub struct PerHostTtl {
    hosts: RwLock<HashMap<String, Ttl>>,
    default_ttl: Ttl,
}

impl PerHostTtl {
    pub fn new(default_ttl: Ttl) -> Self {
        Self::with_hosts(HashMap::new(), default_ttl)
    }

    pub fn with_hosts(hosts: HashMap<String, Ttl>, default_ttl: Ttl) -> Self {
        Self {
            hosts: RwLock::new(hosts),
            default_ttl,
        }
    }

    /// Registers or replaces the TTL for `host`.
    pub fn set_ttl(&self, host: impl Into<String>, ttl: Ttl) {
        self.hosts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(host.into(), ttl);
    }

    /// The TTL registered for `host`, or the default.
    pub fn ttl_for(&self, host: &str) -> Ttl {
        self.hosts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

impl ExpirationPolicy for PerHostTtl {
    fn evaluate(&self, request: &Request, _response: &Response) -> Ttl {
        match request.url().host_str() {
            Some(host) => self.ttl_for(host),
            None => self.default_ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StatusCode;

    fn evaluate(policy: &dyn ExpirationPolicy, url: &str) -> Ttl {
        let request = Request::get(url).unwrap();
        policy.evaluate(&request, &Response::new(StatusCode::OK))
    }

    #[test]
    fn never_expire() {
        assert_eq!(evaluate(&NeverExpire, "http://a.test/"), Ttl::Forever);
    }

    #[test]
    fn fixed_ttl_ignores_the_response() {
        let policy = FixedTtl::new(Duration::from_secs(30));
        assert_eq!(
            evaluate(&policy, "http://a.test/x"),
            Ttl::Expires(Duration::from_secs(30))
        );
        assert_eq!(evaluate(&FixedTtl::new(Duration::ZERO), "http://a.test/"), Ttl::DontCache);
    }

    #[test]
    fn per_host_matches_exact_host_only() {
        let policy = PerHostTtl::new(Ttl::DontCache);
        policy.set_ttl("example.com", Ttl::Forever);

        assert_eq!(evaluate(&policy, "http://example.com/a"), Ttl::Forever);
        assert_eq!(evaluate(&policy, "http://www.example.com/a"), Ttl::DontCache);
    }

    #[test]
    fn per_host_updates_through_shared_handle() {
        let policy = Arc::new(PerHostTtl::new(Ttl::Forever));
        let engine_view: Arc<dyn ExpirationPolicy> = policy.clone();

        assert_eq!(evaluate(&engine_view, "http://news.test/"), Ttl::Forever);
        policy.set_ttl("news.test", Ttl::Expires(Duration::from_secs(5)));
        assert_eq!(
            evaluate(&engine_view, "http://news.test/"),
            Ttl::Expires(Duration::from_secs(5))
        );
    }
}
