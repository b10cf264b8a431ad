//! The request object handed to handlers.
//!
//! An [`HttpRequest`] owns the decoded header and borrows the connection's payload stream for
//! the duration of one exchange. The body is pulled on demand with [`HttpRequest::recv`], each
//! wait bounded by the connection's receive timeout.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use bytes::{Buf, Bytes};
use futures::{Stream, StreamExt};
use http::header::AsHeaderName;
use http::{HeaderMap, HeaderValue, Method, Uri, Version};
use tokio::time::timeout;
use tracing::trace;

use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RecvError, RequestHeader, RequestMessage};

/// The decoded message stream of a connection, borrowed while a request is in flight.
pub type PayloadStream<'conn> = Pin<&'conn mut (dyn Stream<Item = Result<RequestMessage, ParseError>> + Send + Unpin + 'conn)>;

pub struct HttpRequest<'conn> {
    header: RequestHeader,
    payload_size: PayloadSize,
    payload: PayloadStream<'conn>,
    recv_timeout: Duration,
    pending: Bytes,
    received: u64,
    eof: bool,
}

impl fmt::Debug for HttpRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("header", &self.header)
            .field("payload_size", &self.payload_size)
            .field("received", &self.received)
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

impl<'conn> HttpRequest<'conn> {
    pub fn new(header: RequestHeader, payload_size: PayloadSize, payload: PayloadStream<'conn>, recv_timeout: Duration) -> Self {
        Self { header, payload_size, payload, recv_timeout, pending: Bytes::new(), received: 0, eof: false }
    }

    pub fn header(&self) -> &RequestHeader {
        &self.header
    }

    pub fn method(&self) -> &Method {
        self.header.method()
    }

    pub fn uri(&self) -> &Uri {
        self.header.uri()
    }

    /// The request path without its query string, which is what routes match on.
    pub fn path(&self) -> &str {
        self.header.path()
    }

    pub fn version(&self) -> Version {
        self.header.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.header.headers()
    }

    pub fn header_value<K: AsHeaderName>(&self, name: K) -> Option<&HeaderValue> {
        self.header.header(name)
    }

    /// The number of body bytes announced by `Content-Length`, 0 when absent.
    pub fn content_length(&self) -> u64 {
        self.payload_size.len()
    }

    /// Body bytes that have not been handed out yet.
    pub fn remaining(&self) -> u64 {
        self.payload_size.len().saturating_sub(self.received)
    }

    /// Reads body bytes into `buf` until it is full or the body ends.
    ///
    /// Returns the number of bytes written, which is short only when the body ended early
    /// (or the peer went away). Waiting longer than the receive timeout for the next piece of
    /// the body fails with [`RecvError::Timeout`].
    pub async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, RecvError> {
        let mut filled = 0;

        while filled < buf.len() {
            if self.pending.is_empty() {
                if !self.fill_pending().await? {
                    break;
                }
                continue;
            }

            let n = self.pending.len().min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&self.pending[..n]);
            self.pending.advance(n);
            filled += n;
        }

        self.received += filled as u64;
        Ok(filled)
    }

    /// Discards whatever is left of the body, leaving the stream at the next request.
    pub async fn drain(&mut self) -> Result<(), RecvError> {
        let skipped = self.pending.len() as u64;
        self.pending.clear();
        self.received += skipped;

        while self.fill_pending().await? {
            self.received += self.pending.len() as u64;
            self.pending.clear();
        }
        Ok(())
    }

    /// Pulls the next chunk into `pending`, returns false once the body is exhausted.
    async fn fill_pending(&mut self) -> Result<bool, RecvError> {
        if self.eof {
            return Ok(false);
        }

        let next = timeout(self.recv_timeout, self.payload.next()).await.map_err(|_e| RecvError::Timeout)?;

        match next {
            Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => {
                trace!(chunk_size = bytes.len(), "received body chunk");
                self.pending = bytes;
                Ok(true)
            }
            Some(Ok(Message::Payload(PayloadItem::Eof))) | None => {
                self.eof = true;
                Ok(false)
            }
            Some(Ok(Message::Header(_))) => {
                self.eof = true;
                Err(ParseError::invalid_body("received a request header while reading body").into())
            }
            Some(Err(e)) => {
                self.eof = true;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use http::Request;

    fn post_header(length: u64) -> RequestHeader {
        Request::builder().method(Method::POST).uri("/temp").header("content-length", length).body(()).unwrap().into()
    }

    fn chunk(bytes: &'static [u8]) -> Result<RequestMessage, ParseError> {
        Ok(Message::Payload(PayloadItem::Chunk(Bytes::from_static(bytes))))
    }

    fn eof() -> Result<RequestMessage, ParseError> {
        Ok(Message::Payload(PayloadItem::Eof))
    }

    #[tokio::test]
    async fn recv_joins_chunks() {
        let mut payload = stream::iter(vec![chunk(b"21"), chunk(b".5"), eof()]);
        let mut request = HttpRequest::new(post_header(4), PayloadSize::Length(4), Pin::new(&mut payload), Duration::from_secs(1));

        let mut buf = [0u8; 4];
        assert_eq!(request.recv(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"21.5");
        assert_eq!(request.remaining(), 0);

        // the body is exhausted
        assert_eq!(request.recv(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn recv_splits_chunks() {
        let mut payload = stream::iter(vec![chunk(b"abcdef"), eof()]);
        let mut request = HttpRequest::new(post_header(6), PayloadSize::Length(6), Pin::new(&mut payload), Duration::from_secs(1));

        let mut buf = [0u8; 4];
        assert_eq!(request.recv(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(request.remaining(), 2);

        assert_eq!(request.recv(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
    }

    #[tokio::test]
    async fn short_read_when_peer_goes_away() {
        let mut payload = stream::iter(vec![chunk(b"ab")]);
        let mut request = HttpRequest::new(post_header(4), PayloadSize::Length(4), Pin::new(&mut payload), Duration::from_secs(1));

        let mut buf = [0u8; 4];
        assert_eq!(request.recv(&mut buf).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn recv_times_out() {
        let mut payload = stream::pending::<Result<RequestMessage, ParseError>>();
        let mut request = HttpRequest::new(post_header(4), PayloadSize::Length(4), Pin::new(&mut payload), Duration::from_millis(20));

        let mut buf = [0u8; 4];
        let result = request.recv(&mut buf).await;
        assert!(result.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn drain_consumes_eof() {
        let mut payload = stream::iter(vec![chunk(b"ab"), chunk(b"cd"), eof(), chunk(b"next")]);
        {
            let mut request = HttpRequest::new(post_header(4), PayloadSize::Length(4), Pin::new(&mut payload), Duration::from_secs(1));

            let mut buf = [0u8; 1];
            request.recv(&mut buf).await.unwrap();
            request.drain().await.unwrap();
            assert_eq!(request.remaining(), 0);
        }

        // the stream is positioned right after the body
        assert!(matches!(payload.next().await, Some(Ok(Message::Payload(PayloadItem::Chunk(ref b)))) if &b[..] == b"next"));
    }

    #[tokio::test]
    async fn empty_body_still_ends_with_eof() {
        let header: RequestHeader = Request::builder().method(Method::GET).uri("/temp").body(()).unwrap().into();
        let mut payload = stream::iter(vec![eof()]);
        let mut request = HttpRequest::new(header, PayloadSize::Empty, Pin::new(&mut payload), Duration::from_millis(20));

        assert_eq!(request.content_length(), 0);
        let mut buf = [0u8; 4];
        assert_eq!(request.recv(&mut buf).await.unwrap(), 0);
        request.drain().await.unwrap();
    }
}
