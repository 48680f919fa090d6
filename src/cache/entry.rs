//! The stored record and its time-to-live.

use std::time::{Duration, SystemTime};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::Headers;

/// How long an entry stays fresh, decided once when it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ttl {
    /// Never goes stale.
    Forever,
    /// Must not be stored at all. An entry carrying it is always stale.
    DontCache,
    /// Stale once this much time has passed since `stored_at`.
    Expires(Duration),
}

impl Ttl {
    /// Returns `true` for [`Ttl::DontCache`].
    pub fn is_dont_cache(self) -> bool {
        matches!(self, Self::DontCache)
    }

    /// Whether an entry written at `stored_at` is still fresh at `now`.
    ///
    /// The deadline itself is still fresh; an unrepresentable deadline
    /// counts as never reached.
    pub fn is_fresh(self, stored_at: SystemTime, now: SystemTime) -> bool {
        match self {
            Self::Forever => true,
            Self::DontCache => false,
            Self::Expires(ttl) => stored_at.checked_add(ttl).is_none_or(|deadline| now <= deadline),
        }
    }
}

impl From<Duration> for Ttl {
    /// A zero duration means "don't cache".
    fn from(ttl: Duration) -> Self {
        if ttl.is_zero() {
            Self::DontCache
        } else {
            Self::Expires(ttl)
        }
    }
}

/// What an entry holds: a response body, or a pointer to another URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// A `200 OK` body with the preserved subset of its headers.
    Content {
        #[serde(with = "base64_bytes")]
        body: Bytes,
        headers: Headers,
    },
    /// A recorded `301` / `307` whose target should be looked up instead.
    RedirectTo(Url),
}

/// One cached record. Overwritten wholesale, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub payload: Payload,
    pub stored_at: SystemTime,
    pub ttl: Ttl,
}

impl Entry {
    pub fn new(payload: Payload, stored_at: SystemTime, ttl: Ttl) -> Self {
        Self {
            payload,
            stored_at,
            ttl,
        }
    }

    /// Freshness at `now`; see [`Ttl::is_fresh`].
    pub fn is_fresh(&self, now: SystemTime) -> bool {
        self.ttl.is_fresh(self.stored_at, now)
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn zero_duration_means_dont_cache() {
        assert_eq!(Ttl::from(Duration::ZERO), Ttl::DontCache);
        assert_eq!(Ttl::from(MINUTE), Ttl::Expires(MINUTE));
    }

    #[test]
    fn freshness_boundaries() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let ttl = Ttl::Expires(MINUTE);
        assert!(ttl.is_fresh(t0, t0));
        assert!(ttl.is_fresh(t0, t0 + MINUTE));
        assert!(!ttl.is_fresh(t0, t0 + MINUTE + Duration::from_secs(1)));
        assert!(Ttl::Forever.is_fresh(t0, t0 + Duration::from_secs(10_000_000)));
        assert!(!Ttl::DontCache.is_fresh(t0, t0));
    }

    #[test]
    fn entry_json_keeps_body_bytes() {
        let entry = Entry::new(
            Payload::Content {
                body: Bytes::from_static(b"REDIRECT:http://not-a-pointer/\x00\xff"),
                headers: Headers::new(),
            },
            SystemTime::UNIX_EPOCH,
            Ttl::Forever,
        );
        let json = serde_json::to_vec(&entry).unwrap();
        let back: Entry = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, entry);
        assert!(matches!(back.payload, Payload::Content { .. }));
    }

    #[test]
    fn redirect_payload_serializes_as_url() {
        let payload = Payload::RedirectTo(Url::parse("http://example.com/b").unwrap());
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"redirect_to":"http://example.com/b"}"#);
    }
}
