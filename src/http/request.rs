//! Outbound HTTP/1.1 requests.

use bytes::{BufMut, Bytes, BytesMut};
use url::Url;

use super::{Headers, Method};

/// An outbound HTTP request addressed by an absolute URL.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::{Method, Request};
///
/// let request = Request::get("http://example.com/search?q=rust")
///     .unwrap()
///     .header("Accept", "text/html");
///
/// assert_eq!(request.method(), &Method::Get);
/// assert_eq!(request.url().host_str(), Some("example.com"));
///
/// let wire = request.into_bytes();
/// let text = std::str::from_utf8(&wire).unwrap();
/// assert!(text.starts_with("GET /search?q=rust HTTP/1.1\r\n"));
/// assert!(text.contains("Host: example.com\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Creates a request with no headers and an empty body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Creates a `GET` request for `url`.
    ///
    /// # Errors
    ///
    /// Returns the [`url::ParseError`] if `url` is not an absolute URL.
    pub fn get(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Method::Get, Url::parse(url)?))
    }

    /// Appends a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Points the request at `url`.
    ///
    /// An explicit `Host` header is dropped when the host changes, so the
    /// derived one matches the new target.
    pub fn set_url(&mut self, url: Url) {
        if url.host_str() != self.url.host_str() || url.port() != self.url.port() {
            self.headers.remove("host");
        }
        self.url = url;
    }

    /// Serializes the request into HTTP/1.1 wire format.
    ///
    /// The request target is written in origin form (path and query). A
    /// `Host` header is derived from the URL unless one was set explicitly,
    /// and `Content-Length` is written whenever the body is non-empty.
    pub fn into_bytes(self) -> BytesMut {
        let mut target = self.url.path().to_owned();
        if let Some(query) = self.url.query() {
            target.push('?');
            target.push_str(query);
        }

        let estimated_size = 64 + target.len() + self.headers.len() * 64 + self.body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(format!("{} {} HTTP/1.1\r\n", self.method, target).as_bytes());

        if !self.headers.contains("host") {
            if let Some(host) = self.url.host_str() {
                let host = match self.url.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host.to_owned(),
                };
                buf.put(format!("Host: {host}\r\n").as_bytes());
            }
        }

        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        if !self.body.is_empty() && !self.headers.contains("content-length") {
            buf.put(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }

        buf.put(&b"\r\n"[..]);
        buf.put(self.body);
        buf
    }
}
