//! Declarative cache settings, loadable from JSON.
//!
//! ```json
//! {
//!   "storage": { "mode": "persistent", "dir": "/var/cache/app" },
//!   "ttl": { "seconds": 300 },
//!   "hosts": { "static.example.com": "forever", "live.example.com": "never" },
//!   "max_redirects": 20
//! }
//! ```

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{
    CacheError, CachingTransport, DEFAULT_MAX_REDIRECTS, ExpirationPolicy, FileBackend, FixedTtl,
    LruBackend, MemoryBackend, NeverExpire, PerHostTtl, Ttl,
};
use crate::transport::Transport;

/// Where entries live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StorageConfig {
    /// One file per URL under `dir`, created if absent.
    Persistent { dir: PathBuf },
    /// In memory, at most `max_items` entries.
    Volatile { max_items: usize },
    /// In memory, unbounded.
    Memory,
}

/// A TTL as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlConfig {
    #[default]
    Forever,
    Never,
    Seconds(u64),
}

impl From<TtlConfig> for Ttl {
    fn from(config: TtlConfig) -> Self {
        match config {
            TtlConfig::Forever => Ttl::Forever,
            TtlConfig::Never => Ttl::DontCache,
            TtlConfig::Seconds(secs) => Duration::from_secs(secs).into(),
        }
    }
}

/// Everything needed to build a [`CachingTransport`] around a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    pub storage: StorageConfig,

    /// TTL for hosts without an entry in `hosts`.
    #[serde(default)]
    pub ttl: TtlConfig,

    /// Exact-host TTL overrides.
    #[serde(default)]
    pub hosts: HashMap<String, TtlConfig>,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}

impl CacheConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// [`CacheError::ConfigParse`] for malformed JSON or unknown fields,
    /// [`CacheError::InvalidConfig`] for values that can not work.
    pub fn from_json(json: &str) -> Result<Self, CacheError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects a zero item ceiling and a zero redirect limit.
    pub fn validate(&self) -> Result<(), CacheError> {
        if let StorageConfig::Volatile { max_items: 0 } = self.storage {
            return Err(CacheError::InvalidConfig(
                "volatile storage needs max_items > 0".into(),
            ));
        }
        if self.max_redirects == 0 {
            return Err(CacheError::InvalidConfig("max_redirects must be > 0".into()));
        }
        Ok(())
    }

    /// The policy these settings describe: [`PerHostTtl`] when hosts are
    /// listed, otherwise [`NeverExpire`] or [`FixedTtl`].
    pub fn policy(&self) -> Box<dyn ExpirationPolicy> {
        let default_ttl = Ttl::from(self.ttl);
        if !self.hosts.is_empty() {
            let hosts = self
                .hosts
                .iter()
                .map(|(host, ttl)| (host.clone(), Ttl::from(*ttl)))
                .collect();
            return Box::new(PerHostTtl::with_hosts(hosts, default_ttl));
        }
        match default_ttl {
            Ttl::Forever => Box::new(NeverExpire),
            ttl => Box::new(FixedTtl::from_ttl(ttl)),
        }
    }

    /// Wraps `inner` according to these settings.
    ///
    /// # Errors
    ///
    /// Validation errors, or [`CacheError::CreateDir`] for persistent storage
    /// whose directory can not be created.
    pub async fn build<T: Transport>(&self, inner: T) -> Result<CachingTransport<T>, CacheError> {
        self.validate()?;

        let builder = CachingTransport::builder(inner)
            .policy(self.policy())
            .max_redirects(self.max_redirects);

        let builder = match &self.storage {
            StorageConfig::Persistent { dir } => builder.backend(FileBackend::create(dir).await?),
            StorageConfig::Volatile { max_items } => {
                let capacity = NonZeroUsize::new(*max_items).ok_or_else(|| {
                    CacheError::InvalidConfig("volatile storage needs max_items > 0".into())
                })?;
                builder.backend(LruBackend::new(capacity))
            }
            StorageConfig::Memory => builder.backend(MemoryBackend::new()),
        };

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Request, Response, StatusCode};
    use crate::transport::from_fn;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = CacheConfig::from_json(r#"{ "storage": { "mode": "memory" } }"#).unwrap();
        assert_eq!(config.storage, StorageConfig::Memory);
        assert_eq!(config.ttl, TtlConfig::Forever);
        assert!(config.hosts.is_empty());
        assert_eq!(config.max_redirects, DEFAULT_MAX_REDIRECTS);
    }

    #[test]
    fn full_config_parses() {
        let config = CacheConfig::from_json(
            r#"{
                "storage": { "mode": "volatile", "max_items": 500 },
                "ttl": { "seconds": 60 },
                "hosts": { "a.test": "never", "b.test": "forever" },
                "max_redirects": 5
            }"#,
        )
        .unwrap();
        assert_eq!(config.storage, StorageConfig::Volatile { max_items: 500 });
        assert_eq!(Ttl::from(config.ttl), Ttl::Expires(Duration::from_secs(60)));
        assert_eq!(config.hosts["a.test"], TtlConfig::Never);
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn policy_reflects_host_table() {
        let config = CacheConfig::from_json(
            r#"{ "storage": { "mode": "memory" }, "ttl": "never", "hosts": { "a.test": "forever" } }"#,
        )
        .unwrap();
        let policy = config.policy();
        let ok = Response::new(StatusCode::OK);
        let a = Request::get("http://a.test/").unwrap();
        let b = Request::get("http://b.test/").unwrap();
        assert_eq!(policy.evaluate(&a, &ok), Ttl::Forever);
        assert_eq!(policy.evaluate(&b, &ok), Ttl::DontCache);
    }

    #[test]
    fn rejects_unknown_fields_and_bad_values() {
        assert!(matches!(
            CacheConfig::from_json(r#"{ "storage": { "mode": "memory" }, "tll": "forever" }"#),
            Err(CacheError::ConfigParse(_))
        ));
        assert!(matches!(
            CacheConfig::from_json(r#"{ "storage": { "mode": "volatile", "max_items": 0 } }"#),
            Err(CacheError::InvalidConfig(_))
        ));
        assert!(matches!(
            CacheConfig::from_json(r#"{ "storage": { "mode": "memory" }, "max_redirects": 0 }"#),
            Err(CacheError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn build_persistent_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("http-cache");
        let config = CacheConfig {
            storage: StorageConfig::Persistent { dir: dir.clone() },
            ttl: TtlConfig::Forever,
            hosts: HashMap::new(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        };

        let origin = from_fn(|_req| async { Ok(Response::new(StatusCode::OK).body("disk")) });
        let cached = config.build(origin).await.unwrap();
        assert!(dir.is_dir());

        cached.intercept(Request::get("http://example.com/a").unwrap()).await.unwrap();
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);
    }
}
