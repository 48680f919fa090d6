//! File-backed storage: one JSON document per cache key.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Backend, BackendError};
use crate::cache::{CacheError, CacheKey, Entry};
use crate::transport::BoxFuture;

/// Stores each entry in `<dir>/<sanitized key>`.
///
/// Writes go to a temporary file that is renamed over the final one, and are
/// serialized by a per-instance lock, so readers never observe a half-written
/// entry. Unreadable or undecodable files are reported as not found.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// A backend over an existing directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Creates `dir` (and its parents) if absent, then returns a backend over it.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::CreateDir`] if the directory can not be created.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| CacheError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        Ok(Self::new(dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.to_file_name())
    }

    async fn read(&self, key: &CacheKey) -> Result<Entry, BackendError> {
        let path = self.path_for(key);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!(path = ?path, error = %e, "failed to read cache file");
                }
                return Err(BackendError::not_found(key));
            }
        };

        serde_json::from_slice(&raw).map_err(|e| {
            warn!(path = ?path, error = %e, "failed to decode cache file");
            BackendError::not_found(key)
        })
    }

    async fn write(&self, key: &CacheKey, entry: Entry) -> Result<(), BackendError> {
        let encoded = serde_json::to_vec(&entry)?;
        let path = self.path_for(key);
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let _guard = self.write_lock.lock().await;
        if let Err(e) = fs::write(&tmp, &encoded).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(key = %key, bytes = encoded.len(), "cache entry written to file");
        Ok(())
    }
}

impl Backend for FileBackend {
    fn get<'a>(&'a self, key: &'a CacheKey) -> BoxFuture<'a, Result<Entry, BackendError>> {
        Box::pin(self.read(key))
    }

    fn put<'a>(&'a self, key: &'a CacheKey, entry: Entry) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(self.write(key, entry))
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

    fn key(url: &str) -> CacheKey {
        CacheKey::from_url(&Url::parse(url).unwrap())
    }

    fn content(body: &'static [u8]) -> Entry {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/octet-stream");
        Entry::new(
            Payload::Content {
                body: Bytes::from_static(body),
                headers,
            },
            SystemTime::now(),
            Ttl::Forever,
        )
    }

    #[tokio::test]
    async fn create_makes_missing_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("cache");
        let backend = FileBackend::create(&dir).await.unwrap();
        assert!(dir.is_dir());
        assert_eq!(backend.dir(), dir.as_path());
    }

    #[tokio::test]
    async fn put_then_get_preserves_payload_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(tmp.path());

        for (url, body) in [
            ("http://example.com/empty", &b""[..]),
            ("http://example.com/binary", &b"\x00\x01\xfe\xff"[..]),
            ("http://example.com/prefix", &b"REDIRECT:http://example.com/elsewhere"[..]),
        ] {
            let k = key(url);
            let entry = content(body);
            backend.put(&k, entry.clone()).await.unwrap();
            let back = backend.get(&k).await.unwrap();
            assert_eq!(back, entry);
            assert!(matches!(back.payload, Payload::Content { .. }));
        }
    }

    #[tokio::test]
    async fn put_overwrites_wholesale() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(tmp.path());
        let k = key("http://example.com/a");

        backend.put(&k, content(b"first")).await.unwrap();
        let redirect = Entry::new(
            Payload::RedirectTo(Url::parse("http://example.com/b").unwrap()),
            SystemTime::now(),
            Ttl::Forever,
        );
        backend.put(&k, redirect.clone()).await.unwrap();
        assert_eq!(backend.get(&k).await.unwrap(), redirect);
    }

    #[tokio::test]
    async fn missing_and_corrupt_files_are_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(tmp.path());
        let k = key("http://example.com/corrupt");

        assert!(matches!(backend.get(&k).await, Err(BackendError::NotFound { .. })));

        std::fs::write(backend.path_for(&k), b"{ not json").unwrap();
        assert!(matches!(backend.get(&k).await, Err(BackendError::NotFound { .. })));
    }

    #[tokio::test]
    async fn write_into_missing_directory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(tmp.path().join("does-not-exist"));
        let err = backend
            .put(&key("http://example.com/"), content(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Io(_)));
    }
}
