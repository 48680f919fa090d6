//! Cache key derivation.

use std::fmt;

use url::Url;

/// Characters that are not allowed in file names on Windows (`\/:*?"<>|`)
/// or UNIX (`/`).
const FILE_NAME_UNSAFE: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Substitute for every [`FILE_NAME_UNSAFE`] character.
const FILE_NAME_SUBSTITUTE: char = '-';

/// The storage identity of a request: its URL without the fragment.
///
/// Scheme and host are already lowercased and default ports dropped by
/// [`Url`] parsing, so equivalent spellings share a key.
///
/// # Examples
///
/// ```
/// use rttp_cache::cache::CacheKey;
/// use url::Url;
///
/// let key = CacheKey::from_url(&Url::parse("HTTP://Example.com:80/a?b=c#frag").unwrap());
/// assert_eq!(key.as_str(), "http://example.com/a?b=c");
/// assert_eq!(key.to_file_name(), "http---example.com-a-b=c");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_url(url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key with every file-name-unsafe character replaced by `-`.
    ///
    /// Distinct keys may collide after sanitizing (`a/b` and `a-b`).
    pub fn to_file_name(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if FILE_NAME_UNSAFE.contains(&c) {
                    FILE_NAME_SUBSTITUTE
                } else {
                    c
                }
            })
            .collect()
    }
}

impl From<&Url> for CacheKey {
    fn from(url: &Url) -> Self {
        Self::from_url(url)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
