//! The request handler seam between the transport and whatever runs on top of it.

use std::error::Error;

use async_trait::async_trait;
use bytes::Bytes;
use http::Response;

use crate::request::HttpRequest;

/// Error type a handler may fail with.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// Produces a response for a routed request.
///
/// A handler receives the request by mutable reference so it can read the body through
/// [`HttpRequest::recv`]. Returning `Err` aborts the exchange: no response is written and
/// the connection is closed.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, request: &mut HttpRequest<'_>) -> Result<Response<Bytes>, HandlerError>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: Fn(&HttpRequest<'_>) -> Result<Response<Bytes>, HandlerError> + Send + Sync,
{
    async fn call(&self, request: &mut HttpRequest<'_>) -> Result<Response<Bytes>, HandlerError> {
        (self.f)(request)
    }
}

/// Wraps a synchronous closure that answers from the request header alone.
///
/// Any body the client sent is drained by the connection afterwards.
pub fn make_handler<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&HttpRequest<'_>) -> Result<Response<Bytes>, HandlerError> + Send + Sync,
{
    HandlerFn { f }
}
