use crate::codec::header::HeaderEncoder;
use crate::protocol::SendError;
use bytes::{BufMut, Bytes, BytesMut};
use http::Response;
use tokio_util::codec::Encoder;

/// Encodes a complete response: status line, headers and the body in one go.
///
/// Responses of this transport are small and fully buffered, so there is no streaming
/// state to carry between frames.
#[derive(Debug, Default)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Encoder<Response<Bytes>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Response<Bytes>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (parts, body) = item.into_parts();
        self.header_encoder.encode((parts, body.len()), dst)?;

        dst.reserve(body.len());
        dst.put_slice(&body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn body_follows_headers() {
        let response = Response::builder().status(StatusCode::OK).body(Bytes::from_static(b"Resource is updated.")).unwrap();

        let mut dst = BytesMut::new();
        ResponseEncoder::new().encode(response, &mut dst).unwrap();

        let encoded = String::from_utf8(dst.to_vec()).unwrap();
        assert!(encoded.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(encoded.contains("content-length: 20\r\n"));
        assert!(encoded.ends_with("\r\n\r\nResource is updated."));
    }

    #[test]
    fn empty_body() {
        let response = Response::builder().status(StatusCode::NOT_FOUND).body(Bytes::new()).unwrap();

        let mut dst = BytesMut::new();
        ResponseEncoder::new().encode(response, &mut dst).unwrap();
        assert_eq!(&dst[..], b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\n\r\n");
    }
}
