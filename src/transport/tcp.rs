//! Plain-TCP HTTP/1.1 client transport using Tokio.
//!
//! Each exchange opens a fresh connection, sends the request with
//! `Connection: close`, reads until the peer closes and then decodes the
//! body according to `Transfer-Encoding` / `Content-Length`.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::{BoxFuture, Transport, TransportError};
use crate::http::{Method, Request, Response, StatusCode};

/// Default ceiling on a buffered response (head and body), 32 MiB.
const DEFAULT_MAX_RESPONSE_SIZE: usize = 32 * 1024 * 1024;

/// Initial read buffer capacity per exchange.
const INITIAL_BUF_SIZE: usize = 8192;

/// A minimal `http://` client transport.
///
/// `https` is not supported; wrap a TLS-capable transport behind the
/// [`Transport`] trait instead.
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use rttp_cache::http::Request;
/// use rttp_cache::transport::{TcpTransport, Transport};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = TcpTransport::new().with_timeout(Duration::from_secs(10));
/// let response = transport.send(Request::get("http://example.com/")?).await?;
/// println!("{}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TcpTransport {
    timeout: Option<Duration>,
    max_response_size: usize,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpTransport {
    /// A transport with no timeout and a 32 MiB response ceiling.
    pub fn new() -> Self {
        Self {
            timeout: None,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }

    /// Bounds the whole exchange (connect, write, read) by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Rejects responses larger than `max_bytes`.
    #[must_use]
    pub fn max_response_size(mut self, max_bytes: usize) -> Self {
        self.max_response_size = max_bytes;
        self
    }

    async fn exchange(&self, mut request: Request) -> Result<Response, TransportError> {
        let url = request.url();
        if url.scheme() != "http" {
            return Err(TransportError::UnsupportedScheme {
                scheme: url.scheme().to_owned(),
            });
        }
        let host = url
            .host_str()
            .ok_or_else(|| TransportError::MissingHost {
                url: url.to_string(),
            })?
            .to_owned();
        let port = url.port_or_known_default().unwrap_or(80);

        let method = request.method().clone();
        debug!(method = %method, url = %url, "opening connection");
        let mut stream = TcpStream::connect((host.as_str(), port)).await?;

        request.headers_mut().set("Connection", "close");
        stream.write_all(&request.into_bytes()).await?;
        stream.flush().await?;

        let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);
        loop {
            let bytes_read = stream.read_buf(&mut buf).await?;
            if bytes_read == 0 {
                break;
            }
            if buf.len() > self.max_response_size {
                return Err(TransportError::TooLarge {
                    max_bytes: self.max_response_size,
                });
            }
        }

        let (mut response, body_offset) = Response::parse(&buf)?;
        let raw_body = buf.split_off(body_offset).freeze();
        let body = decode_body(&method, &response, raw_body)?;

        let headers = response.headers_mut();
        if headers.remove("transfer-encoding") {
            headers.set("Content-Length", body.len().to_string());
        }

        debug!(status = %response.status(), bytes = body.len(), "response received");
        Ok(response.body(body))
    }
}

impl Transport for TcpTransport {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
        Box::pin(async move {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, self.exchange(request))
                    .await
                    .map_err(|_| TransportError::Timeout(limit))?,
                None => self.exchange(request).await,
            }
        })
    }
}

/// Picks the body framing advertised by the response head.
///
/// Responses to `HEAD` and `1xx`, `204` and `304` responses never carry a
/// body, whatever their `Content-Length` says.
fn decode_body(method: &Method, response: &Response, raw: Bytes) -> Result<Bytes, TransportError> {
    let status = response.status();
    if *method == Method::Head
        || status.as_u16() < 200
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return Ok(Bytes::new());
    }

    let chunked = response
        .headers()
        .get_all("transfer-encoding")
        .any(|v| v.to_ascii_lowercase().contains("chunked"));
    if chunked {
        return decode_chunked(&raw);
    }

    match response.headers().get("content-length") {
        Some(value) => {
            let len: usize = value.trim().parse().map_err(|_| {
                TransportError::Body(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("invalid Content-Length `{value}`"),
                ))
            })?;
            if raw.len() < len {
                return Err(TransportError::Body(std::io::ErrorKind::UnexpectedEof.into()));
            }
            Ok(raw.slice(..len))
        }
        None => Ok(raw),
    }
}

/// Decodes a `Transfer-Encoding: chunked` body. Trailers are discarded.
fn decode_chunked(mut data: &[u8]) -> Result<Bytes, TransportError> {
    let mut out = BytesMut::with_capacity(data.len());

    loop {
        let line_end = find_crlf(data).ok_or(TransportError::Chunked)?;
        let size_line = std::str::from_utf8(&data[..line_end]).map_err(|_| TransportError::Chunked)?;
        let size_hex = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_hex, 16).map_err(|_| TransportError::Chunked)?;
        data = &data[line_end + 2..];

        if size == 0 {
            return Ok(out.freeze());
        }
        let chunk_end = size.checked_add(2).ok_or(TransportError::Chunked)?;
        if data.len() < chunk_end || &data[size..chunk_end] != b"\r\n" {
            return Err(TransportError::Chunked);
        }
        out.extend_from_slice(&data[..size]);
        data = &data[chunk_end..];
    }
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn chunked_body_is_reassembled() {
        let raw = b"5\r\nhello\r\n6;ext=1\r\n world\r\n0\r\n\r\n";
        assert_eq!(&decode_chunked(raw).unwrap()[..], b"hello world");
    }

    #[test]
    fn truncated_chunk_is_rejected() {
        assert!(matches!(
            decode_chunked(b"a\r\nshort\r\n"),
            Err(TransportError::Chunked)
        ));
    }

    #[test]
    fn oversized_chunk_size_is_rejected() {
        assert!(matches!(
            decode_chunked(b"ffffffffffffffff\r\nab\r\n0\r\n\r\n"),
            Err(TransportError::Chunked)
        ));
        assert!(matches!(
            decode_chunked(b"fffffffffffffffe\r\nab\r\n0\r\n\r\n"),
            Err(TransportError::Chunked)
        ));
    }

    #[test]
    fn content_length_trims_trailing_bytes() {
        let resp = Response::new(StatusCode::OK).header("Content-Length", "3");
        let body = decode_body(&Method::Get, &resp, Bytes::from_static(b"abcdef")).unwrap();
        assert_eq!(&body[..], b"abc");
    }

    #[test]
    fn bodiless_responses_ignore_content_length() {
        let ok = Response::new(StatusCode::OK).header("Content-Length", "1234");
        assert!(decode_body(&Method::Head, &ok, Bytes::new()).unwrap().is_empty());

        for status in [StatusCode::NO_CONTENT, StatusCode::NOT_MODIFIED] {
            let resp = Response::new(status).header("Content-Length", "1234");
            assert!(decode_body(&Method::Get, &resp, Bytes::new()).unwrap().is_empty());
        }

        let still_short = decode_body(&Method::Get, &ok, Bytes::new());
        assert!(matches!(still_short, Err(TransportError::Body(_))));
    }

    #[tokio::test]
    async fn https_is_unsupported() {
        let err = TcpTransport::new()
            .send(Request::get("https://example.com/").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedScheme { scheme } if scheme == "https"));
    }

    #[tokio::test]
    async fn round_trip_against_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = socket.read(&mut buf).await.unwrap();
            let head = String::from_utf8_lossy(&buf[..n]).to_string();
            assert!(head.starts_with("GET /greet HTTP/1.1\r\n"));
            assert!(head.contains("Connection: close\r\n"));
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nhi\r\n0\r\n\r\n",
                )
                .await
                .unwrap();
        });

        let resp = TcpTransport::new()
            .with_timeout(Duration::from_secs(5))
            .send(Request::get(&format!("http://{addr}/greet")).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-length"), Some("2"));
        assert!(!resp.headers().contains("transfer-encoding"));
        assert_eq!(&resp.into_body().bytes().await.unwrap()[..], b"hi");
    }

    #[tokio::test]
    async fn head_response_keeps_advertised_length_without_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = socket.read(&mut buf).await.unwrap();
            assert!(buf[..n].starts_with(b"HEAD /big HTTP/1.1\r\n"));
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1234\r\n\r\n")
                .await
                .unwrap();
        });

        let url = url::Url::parse(&format!("http://{addr}/big")).unwrap();
        let resp = TcpTransport::new()
            .with_timeout(Duration::from_secs(5))
            .send(Request::new(Method::Head, url))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-length"), Some("1234"));
        assert!(resp.into_body().bytes().await.unwrap().is_empty());
    }
}
