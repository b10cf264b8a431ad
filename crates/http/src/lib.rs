//! A micro HTTP transport for resource-oriented servers
//!
//! This crate provides the socket-level half of an embedded-style HTTP server: it accepts
//! connections (plain TCP or TLS), decodes HTTP/1.1 requests, routes them through an exact
//! `(uri, method)` route table and writes the handler's response back. Everything above the
//! transport, such as what a route *means*, lives in the handlers registered on [`routes::Routes`].
//!
//! # Example
//!
//! ```no_run
//! use std::error::Error;
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use bytes::Bytes;
//! use http::{Method, Response, StatusCode};
//! use micro_httpd::handler::Handler;
//! use micro_httpd::request::HttpRequest;
//! use micro_httpd::server::{HttpServer, HttpServerConfig};
//!
//! struct Hello;
//!
//! #[async_trait]
//! impl Handler for Hello {
//!     async fn call(&self, request: &mut HttpRequest<'_>) -> Result<Response<Bytes>, Box<dyn Error + Send + Sync>> {
//!         let body = format!("hello from {}", request.path());
//!         Ok(Response::builder().status(StatusCode::OK).body(Bytes::from(body))?)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn Error>> {
//!     let server = HttpServer::start(HttpServerConfig::insecure(8080)).await?;
//!     server.routes().register("/hello", Method::GET, Arc::new(Hello))?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`codec`]: request decoding and response encoding on top of `tokio_util::codec`
//! - [`protocol`]: message and header types plus the data-plane error types
//! - [`request`]: the per-request object handed to handlers, with a timed body-read primitive
//! - [`routes`]: the `(uri, method) → handler` table
//! - [`handler`]: the [`handler::Handler`] trait
//! - [`connection`]: the per-connection request/response loop
//! - [`server`]: listener, TLS wiring, connection tracking and teardown
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only
//! - Content-Length bodies only, `Transfer-Encoding` is rejected
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64
//! - Exact path routing only, no patterns or wildcards

pub mod codec;
pub mod connection;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod request;
pub mod routes;
pub mod server;

mod utils;
pub(crate) use utils::ensure;

pub use error::HttpdError;
