//! Request payload decoding.
//!
//! Only Content-Length framing is supported: [`PayloadDecoder`] either hands out exactly the
//! announced number of bytes through [`LengthDecoder`] or, for requests without a body, yields
//! the EOF marker straight away.

mod length_decoder;
mod payload_decoder;

pub use payload_decoder::PayloadDecoder;
