//! Core HTTP protocol types shared by the codec, the connection loop and handlers.
//!
//! - **Message handling** ([`Message`], [`PayloadItem`], [`PayloadSize`]): what the request
//!   decoder yields, either a parsed header or a piece of the payload stream
//! - **Request headers** ([`RequestHeader`]): a thin wrapper over `http::Request<()>`
//! - **Errors** ([`HttpError`], [`ParseError`], [`SendError`], [`RecvError`])

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;
pub use message::RequestMessage;

mod request;
pub use request::RequestHeader;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::RecvError;
pub use error::SendError;
