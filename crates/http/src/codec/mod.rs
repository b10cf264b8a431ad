//! HTTP codec module for decoding requests and encoding responses
//!
//! - [`RequestDecoder`]: a state machine that yields the request header first and then the
//!   Content-Length payload in chunks, ending with an EOF marker
//! - [`ResponseEncoder`]: serializes a complete `Response<Bytes>`
//!
//! # Example
//!
//! ```no_run
//! use micro_httpd::codec::{RequestDecoder, ResponseEncoder};
//! use tokio_util::codec::{Decoder, Encoder};
//! use bytes::BytesMut;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut request_buffer = BytesMut::from(&b"GET /temp HTTP/1.1\r\n\r\n"[..]);
//! let request = decoder.decode(&mut request_buffer);
//! ```

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
