//! Response bodies: fully buffered bytes or a stream still being read.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

/// The body of a [`Response`](super::Response).
///
/// A body is either already in memory or backed by an [`AsyncRead`] that
/// yields the bytes as they arrive. Either way it is consumed once, through
/// [`Body::bytes`] or by reading it as an `AsyncRead`.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::Body;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> std::io::Result<()> {
/// let body = Body::from_reader(std::io::Cursor::new(b"streamed".to_vec()));
/// assert_eq!(body.size_hint(), None);
/// assert_eq!(&body.bytes().await?[..], b"streamed");
/// # Ok(())
/// # }
/// ```
pub struct Body {
    kind: Kind,
}

enum Kind {
    Full(Bytes),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl Body {
    /// An empty, fully buffered body.
    pub fn empty() -> Self {
        Self::from(Bytes::new())
    }

    /// A body read lazily from `reader`.
    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            kind: Kind::Reader(Box::new(reader)),
        }
    }

    /// Exact length when the body is buffered, `None` while it is streaming.
    pub fn size_hint(&self) -> Option<u64> {
        match &self.kind {
            Kind::Full(bytes) => Some(bytes.len() as u64),
            Kind::Reader(_) => None,
        }
    }

    /// Borrow the buffered bytes, if the body is not streaming.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match &self.kind {
            Kind::Full(bytes) => Some(bytes),
            Kind::Reader(_) => None,
        }
    }

    /// Drains the body into memory.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error raised by the underlying reader.
    pub async fn bytes(self) -> io::Result<Bytes> {
        match self.kind {
            Kind::Full(bytes) => Ok(bytes),
            Kind::Reader(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Full(bytes) => f.debug_tuple("Body::Full").field(&bytes.len()).finish(),
            Kind::Reader(_) => f.write_str("Body::Reader"),
        }
    }
}

impl AsyncRead for Body {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().kind {
            Kind::Full(bytes) => {
                let n = buf.remaining().min(bytes.len());
                buf.put_slice(&bytes[..n]);
                bytes.advance(n);
                Poll::Ready(Ok(()))
            }
            Kind::Reader(reader) => Pin::new(reader).poll_read(cx, buf),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self {
            kind: Kind::Full(bytes),
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::from(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Self::from(Bytes::from_static(text.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buffered_body_reports_length() {
        let body = Body::from("hello");
        assert_eq!(body.size_hint(), Some(5));
        assert_eq!(&body.bytes().await.unwrap()[..], b"hello");
    }

    #[tokio::test]
    async fn buffered_body_reads_as_async_read() {
        let mut body = Body::from(vec![1u8, 2, 3, 4]);
        let mut first = [0u8; 3];
        body.read_exact(&mut first).await.unwrap();
        assert_eq!(first, [1, 2, 3]);
        let mut rest = Vec::new();
        body.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, vec![4]);
    }

    #[tokio::test]
    async fn reader_error_surfaces_from_bytes() {
        struct Broken;
        impl AsyncRead for Broken {
            fn poll_read(
                self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
                _buf: &mut ReadBuf<'_>,
            ) -> Poll<io::Result<()>> {
                Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
            }
        }

        let err = Body::from_reader(Broken).bytes().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }
}
