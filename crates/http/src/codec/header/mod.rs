//! HTTP header processing for requests (decoding) and responses (encoding).
//!
//! - [`HeaderDecoder`]: parses the request line and header fields, enforcing size limits and
//!   deciding how the payload is framed
//! - [`HeaderEncoder`]: writes the status line and header fields of a response

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
