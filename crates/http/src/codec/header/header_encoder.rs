//! HTTP header encoder implementation for serializing HTTP response headers
//!
//! Writes the status line and every header field of a response. The Content-Length header is
//! always derived from the body that follows, overriding whatever the handler set.

use crate::protocol::SendError;

use bytes::{BufMut, BytesMut};

use http::response::Parts;
use http::{HeaderValue, Version, header};
use std::io;
use std::io::Write;
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 1024;

/// Encoder for HTTP response headers implementing the [`Encoder`] trait.
///
/// Encodes the response [`Parts`] together with the exact length of the body.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderEncoder;

impl Encoder<(Parts, usize)> for HeaderEncoder {
    type Error = SendError;

    /// Encodes HTTP response headers into the provided bytes buffer.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - the response version is neither HTTP/1.0 nor HTTP/1.1
    /// - writing to the buffer fails
    fn encode(&mut self, item: (Parts, usize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut parts, body_length) = item;

        dst.reserve(INIT_HEADER_SIZE);
        match parts.version {
            // responses are always HTTP/1.1, a 1.0 client understands them
            Version::HTTP_10 | Version::HTTP_11 => {
                write!(
                    FastWrite(dst),
                    "HTTP/1.1 {} {}\r\n",
                    parts.status.as_str(),
                    parts.status.canonical_reason().unwrap_or("Unknown")
                )?;
            }
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(SendError::invalid_response(format!("unsupported http version {v:?}")));
            }
        }

        parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body_length));

        for (header_name, header_value) in parts.headers.iter() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Writer over `BytesMut`, the space has been reserved up front.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Response, StatusCode};

    fn encode(response: Response<()>, body_length: usize) -> String {
        let (parts, _) = response.into_parts();
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((parts, body_length), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn status_line_and_length() {
        let response = Response::builder().status(StatusCode::NOT_ACCEPTABLE).header("content-type", "text/html").body(()).unwrap();

        let encoded = encode(response, 31);
        assert!(encoded.starts_with("HTTP/1.1 406 Not Acceptable\r\n"));
        assert!(encoded.contains("content-type: text/html\r\n"));
        assert!(encoded.contains("content-length: 31\r\n"));
        assert!(encoded.ends_with("\r\n\r\n"));
    }

    #[test]
    fn handler_content_length_is_overridden() {
        let response = Response::builder().header("content-length", "100").body(()).unwrap();

        let encoded = encode(response, 0);
        assert!(encoded.contains("content-length: 0\r\n"));
        assert!(!encoded.contains("100"));
    }

    #[test]
    fn http2_response_is_rejected() {
        let (parts, _) = Response::builder().version(Version::HTTP_2).body(()).unwrap().into_parts();
        let mut dst = BytesMut::new();
        assert!(HeaderEncoder.encode((parts, 0), &mut dst).is_err());
    }
}
