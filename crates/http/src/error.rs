//! Control-plane errors of the transport.
//!
//! Route registration and server start-up fail with [`HttpdError`]. Every variant maps to a
//! stable numeric [`code`] so callers that only understand status codes (or that need to
//! report them further up) can branch on it.

use std::io;
use std::net::SocketAddr;

use http::Method;
use thiserror::Error;

/// Native status codes reported by [`HttpdError::code`].
pub mod code {
    /// Generic failure.
    pub const FAIL: i32 = -1;
    /// An argument, such as a route uri, is malformed.
    pub const INVALID_ARG: i32 = 0x102;
    /// The requested route does not exist.
    pub const NOT_FOUND: i32 = 0x105;
    /// The route table has reached `max_uri_handlers`.
    pub const HANDLERS_FULL: i32 = 0xb001;
    /// A handler is already registered for the `(uri, method)` pair.
    pub const HANDLER_EXISTS: i32 = 0xb002;
    /// The listener task could not be started.
    pub const TASK: i32 = 0xb008;
}

#[derive(Debug, Error)]
pub enum HttpdError {
    #[error("route table is full, max handlers: {max}")]
    HandlersFull { max: usize },

    #[error("handler already registered for {method} {uri}")]
    HandlerExists { uri: String, method: Method },

    #[error("no handler registered for {}", describe_route(.method, .uri))]
    HandlerNotFound { uri: String, method: Option<Method> },

    #[error("invalid route uri: {uri:?}")]
    InvalidUri { uri: String },

    #[error("can't bind listener at {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("invalid tls material: {reason}")]
    Tls { reason: String },
}

impl HttpdError {
    pub fn handler_exists<S: ToString>(uri: S, method: Method) -> Self {
        Self::HandlerExists { uri: uri.to_string(), method }
    }

    pub fn handler_not_found<S: ToString>(uri: S, method: Option<Method>) -> Self {
        Self::HandlerNotFound { uri: uri.to_string(), method }
    }

    pub fn invalid_uri<S: ToString>(uri: S) -> Self {
        Self::InvalidUri { uri: uri.to_string() }
    }

    pub fn tls<S: ToString>(reason: S) -> Self {
        Self::Tls { reason: reason.to_string() }
    }

    /// The native status code of this error.
    pub fn code(&self) -> i32 {
        match self {
            HttpdError::HandlersFull { .. } => code::HANDLERS_FULL,
            HttpdError::HandlerExists { .. } => code::HANDLER_EXISTS,
            HttpdError::HandlerNotFound { .. } => code::NOT_FOUND,
            HttpdError::InvalidUri { .. } => code::INVALID_ARG,
            HttpdError::Bind { .. } => code::TASK,
            HttpdError::Tls { .. } => code::FAIL,
        }
    }
}

fn describe_route(method: &Option<Method>, uri: &str) -> String {
    match method {
        Some(method) => format!("{method} {uri}"),
        None => uri.to_string(),
    }
}
