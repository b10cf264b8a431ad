//! Uri addressable values served over HTTP
//!
//! `micro-resource` keeps a dynamic set of named values ("resources") and serves them with
//! [`micro_httpd`]: a GET returns the current value with the resource's media type, a POST
//! replaces it. User code can be notified about requests through callbacks that run on a
//! dedicated thread, so slow handling never stalls the network side.
//!
//! # Example
//!
//! ```no_run
//! use std::error::Error;
//!
//! use bytes::Bytes;
//! use http::Method;
//! use micro_resource::{MediaType, Methods, ResourceServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn Error>> {
//!     let server = ResourceServer::default();
//!     server.init(8080, None, None).await?;
//!
//!     let temperature = server.add_resource("/temperature", Some("21.5".into()), Some(MediaType::Plain))?;
//!     temperature.bind_callback(Methods::POST, |uri: &str, method: &Method, body: &Bytes| {
//!         println!("{method} {uri}: {body:?}");
//!     })?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`store`]: the resources of a running server, keyed by uri
//! - [`media_type`]: the media type table and content negotiation
//! - [`dispatcher`]: the handler behind every resource route
//! - [`relay`]: hand-off of callbacks to the consumer thread
//! - [`registry`]: keeps the store and the route table in lock-step
//! - [`server`]: init and shutdown of the whole stack, resource handles

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod media_type;
pub mod methods;
pub mod registry;
pub mod relay;
pub mod server;
pub mod store;
pub mod transport;
pub mod value;

mod utils;
pub(crate) use utils::ensure;

pub use config::ServerConfig;
pub use error::ServerError;
pub use media_type::MediaType;
pub use methods::Methods;
pub use relay::ResourceCallback;
pub use server::{ResourceHandle, ResourceServer};
pub use value::{IntegerEncoding, ResourceValue};
