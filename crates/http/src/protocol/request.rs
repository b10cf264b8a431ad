//! HTTP request header handling.
//!
//! Wraps `http::Request<()>` with the few queries the transport and handlers need.

use http::header::{AsHeaderName, CONNECTION, EXPECT};
use http::{HeaderMap, HeaderValue, Method, Request, Uri, Version};

/// Represents an HTTP request header.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl RequestHeader {
    /// Returns a reference to the request's HTTP method.
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    /// Returns a reference to the request's URI.
    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// Returns the path component of the request's URI, without the query string.
    pub fn path(&self) -> &str {
        self.inner.uri().path()
    }

    /// Returns the request's HTTP version.
    pub fn version(&self) -> Version {
        self.inner.version()
    }

    /// Returns a reference to the request's headers.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Looks up the first value of a header by name.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&HeaderValue> {
        self.inner.headers().get(name)
    }

    /// Whether the client sent `Expect: 100-continue`.
    pub fn expects_continue(&self) -> bool {
        self.header(EXPECT).is_some_and(|value| value.as_bytes().len() >= 4 && value.as_bytes()[..4].eq_ignore_ascii_case(b"100-"))
    }

    /// Whether the connection should be closed after this request.
    ///
    /// HTTP/1.1 keeps the connection unless `Connection: close` is sent, HTTP/1.0 closes it
    /// unless `Connection: keep-alive` is sent.
    pub fn wants_close(&self) -> bool {
        let connection = self.header(CONNECTION).map(HeaderValue::as_bytes);
        match self.version() {
            Version::HTTP_10 => !connection.is_some_and(|value| value.eq_ignore_ascii_case(b"keep-alive")),
            _ => connection.is_some_and(|value| value.eq_ignore_ascii_case(b"close")),
        }
    }
}

/// Converts a bodyless request into a RequestHeader.
impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(request: http::request::Builder) -> RequestHeader {
        request.body(()).unwrap().into()
    }

    #[test]
    fn path_ignores_query() {
        let header = header(Request::builder().method(Method::GET).uri("/sensors/temp?unit=c"));
        assert_eq!(header.path(), "/sensors/temp");
        assert_eq!(header.uri().query(), Some("unit=c"));
    }

    #[test]
    fn expect_continue() {
        let with_expect = header(Request::builder().method(Method::POST).header(EXPECT, "100-continue"));
        assert!(with_expect.expects_continue());

        let without_expect = header(Request::builder().method(Method::POST));
        assert!(!without_expect.expects_continue());
    }

    #[test]
    fn connection_close() {
        let keep = header(Request::builder().version(Version::HTTP_11));
        assert!(!keep.wants_close());

        let close = header(Request::builder().version(Version::HTTP_11).header(CONNECTION, "Close"));
        assert!(close.wants_close());

        let http10 = header(Request::builder().version(Version::HTTP_10));
        assert!(http10.wants_close());

        let http10_keep = header(Request::builder().version(Version::HTTP_10).header(CONNECTION, "keep-alive"));
        assert!(!http10_keep.wants_close());
    }
}
