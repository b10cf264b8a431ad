//! HTTP connection handling module
//!
//! [`HttpConnection`] owns one accepted stream (plain or TLS) and runs the request loop on it:
//!
//! - decodes the next request header
//! - answers `Expect: 100-continue`
//! - routes the request through the shared [`Routes`](crate::routes::Routes) table
//! - drains whatever body the handler left unread
//! - writes the response and decides whether the connection stays open

mod http_connection;

pub use http_connection::HttpConnection;
