//! HTTP/1.1 responses: builder API and head parsing using [`httparse`].

use thiserror::Error;
use url::Url;

use super::{Body, Headers, StatusCode};

/// Errors that can occur while parsing an HTTP/1.1 response head.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("status code {code} is out of range")]
    InvalidStatus { code: u16 },
}

/// An HTTP response as seen by the client: status, headers and a [`Body`].
///
/// # Examples
///
/// ```
/// use rttp_cache::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::OK)
///     .header("Content-Type", "application/json")
///     .body(r#"{"status":"ok"}"#);
///
/// assert_eq!(response.status(), StatusCode::OK);
/// assert_eq!(response.content_length(), Some(15));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Body,
}

impl Response {
    /// Maximum number of headers accepted in a response head.
    const MAX_HEADERS: usize = 96;

    /// Creates a response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Body::empty(),
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Replaces the header map wholesale.
    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Consumes the response, returning its body.
    pub fn into_body(self) -> Body {
        self.body
    }

    /// Splits the response into its head and body.
    pub fn into_parts(self) -> (StatusCode, Headers, Body) {
        (self.status, self.headers, self.body)
    }

    /// The body length: the `Content-Length` header if present and valid,
    /// otherwise the length of a buffered body.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get("content-length")
            .and_then(|v| v.trim().parse().ok())
            .or_else(|| self.body.size_hint())
    }

    /// Resolves the `Location` header against `base`.
    ///
    /// Returns `None` when the header is absent or does not form a valid URL.
    pub fn location(&self, base: &Url) -> Option<Url> {
        let location = self.headers.get("location")?;
        base.join(location.trim()).ok()
    }

    /// Parses a response head from `buf`.
    ///
    /// Returns the response (with an empty body) and the offset at which the
    /// body begins in `buf`, immediately after the `\r\n\r\n` terminator.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::Incomplete`] — the head has not been fully received.
    /// - [`ResponseError::Parse`] — the head is malformed.
    /// - [`ResponseError::MissingField`] — the status code is absent.
    /// - [`ResponseError::InvalidStatus`] — the status code is not three digits.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), ResponseError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw = httparse::Response::new(&mut headers);

        let body_offset = match raw.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(ResponseError::Incomplete),
        };

        let code = raw.code.ok_or(ResponseError::MissingField { field: "status" })?;
        let status = StatusCode::from_u16(code).ok_or(ResponseError::InvalidStatus { code })?;

        let mut header_map = Headers::with_capacity(raw.headers.len());
        for header in raw.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        Ok((Self::new(status).with_headers(header_map), body_offset))
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_head_and_offset() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello";
        let (resp, offset) = Response::parse(raw).unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type"), Some("text/plain"));
        assert_eq!(resp.content_length(), Some(5));
        assert_eq!(&raw[offset..], b"hello");
    }

    #[test]
    fn parse_incomplete_head() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-";
        assert!(matches!(Response::parse(raw), Err(ResponseError::Incomplete)));
    }

    #[test]
    fn parse_garbage() {
        let raw = b"NOT HTTP AT ALL\r\n\r\n";
        assert!(matches!(Response::parse(raw), Err(ResponseError::Parse(_))));
    }

    #[test]
    fn location_resolves_relative_paths() {
        let base = Url::parse("http://example.com/a/b").unwrap();
        let resp = Response::new(StatusCode::MOVED_PERMANENTLY).header("Location", "/c?d=1");
        assert_eq!(
            resp.location(&base).unwrap().as_str(),
            "http://example.com/c?d=1"
        );
    }

    #[test]
    fn location_missing() {
        let base = Url::parse("http://example.com/").unwrap();
        assert!(Response::new(StatusCode::FOUND).location(&base).is_none());
    }

    #[test]
    fn buffered_body_length_without_header() {
        let resp = Response::new(StatusCode::OK).body("abc");
        assert_eq!(resp.content_length(), Some(3));
    }
}
