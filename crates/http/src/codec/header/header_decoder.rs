//! HTTP header decoder implementation for parsing HTTP request headers
//!
//! Parses the request line and header fields with `httparse`, converts them into a typed
//! [`RequestHeader`] and decides how the payload that follows is framed.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: 8KB
//! - Only HTTP/1.0 and HTTP/1.1
//! - Bodies must be framed by Content-Length, any Transfer-Encoding is rejected

use bytes::{Buf, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, Version};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;

use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Shortest possible request line plus terminator, e.g. `GET / HTTP/1.1\n\n`
const MIN_REQUEST_BYTES: usize = 14;

/// Decoder for HTTP request headers implementing the [`Decoder`] trait.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    /// Attempts to decode HTTP headers from the provided bytes buffer.
    ///
    /// On success the header bytes are consumed from `src`; the payload stays in place.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if:
    /// - The number of headers exceeds `MAX_HEADER_NUM`
    /// - The total header size exceeds `MAX_HEADER_BYTES`
    /// - The HTTP version is not supported
    /// - The method, uri or a header field is malformed
    /// - The payload framing is invalid or unsupported
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < MIN_REQUEST_BYTES {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let status = req.parse(src).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        })?;

        let body_offset = match status {
            Status::Complete(body_offset) => body_offset,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };

        trace!(header_size = body_offset, "parsed request header");
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let version = match req.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            // HTTP/2 and HTTP/3 are not supported
            v => return Err(ParseError::InvalidVersion(v)),
        };

        let method = req.method.ok_or(ParseError::InvalidMethod)?;
        let method = Method::from_bytes(method.as_bytes()).map_err(|_e| ParseError::InvalidMethod)?;

        let path = req.path.ok_or(ParseError::InvalidUri)?;
        let uri = Uri::try_from(path).map_err(|_e| ParseError::InvalidUri)?;

        let mut header_map = HeaderMap::with_capacity(req.headers.len());
        for header in req.headers.iter() {
            let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::invalid_header)?;
            let value = HeaderValue::from_bytes(header.value).map_err(ParseError::invalid_header)?;
            header_map.append(name, value);
        }

        let mut request = Request::new(());
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        *request.version_mut() = version;
        *request.headers_mut() = header_map;

        // the header bytes are parsed, leave only the payload (and anything after it) in `src`
        src.advance(body_offset);

        let header = RequestHeader::from(request);
        let payload_size = parse_payload(&header)?;

        Ok(Some((header, payload_size)))
    }
}

/// Determines how the payload of the request is framed.
///
/// A Content-Length header announces a body for any method; requests without one have no
/// body. Transfer-Encoding (chunked or otherwise) is not supported by this transport.
///
/// refer: <https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length>
fn parse_payload(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    if let Some(te_value) = header.header(http::header::TRANSFER_ENCODING) {
        let encoding = String::from_utf8_lossy(te_value.as_bytes());
        return Err(ParseError::unsupported_transfer_encoding(encoding));
    }

    match header.header(http::header::CONTENT_LENGTH) {
        None => Ok(PayloadSize::new_empty()),
        Some(cl_value) => {
            let cl_str = cl_value.to_str().map_err(|_e| ParseError::invalid_content_length("value can't to_str"))?;

            let length =
                cl_str.trim().parse::<u64>().map_err(|_e| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

            Ok(PayloadSize::new_length(length))
        }
    }
}
