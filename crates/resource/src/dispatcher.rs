//! The request dispatcher: the handler every resource route points at.
//!
//! Per request it resolves the resource, reads the declared body, applies the GET or POST
//! semantics and finally hands the request off to the callback relay when a callback is bound
//! for the method. Every failure is terminal for that request: either an HTTP status is
//! answered or, when nothing sensible can be sent, the connection is dropped.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{ACCEPT, CONNECTION, CONTENT_TYPE};
use http::{HeaderValue, Method, Response, StatusCode};
use micro_httpd::handler::{Handler, HandlerError};
use micro_httpd::protocol::RecvError;
use micro_httpd::request::HttpRequest;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::ensure;
use crate::media_type::{MediaType, is_acceptable, media_type_id};
use crate::methods::Methods;
use crate::relay::{CallbackMessage, CallbackRelay};
use crate::store::{Resource, ResourceStore};

const NOT_FOUND_BODY: &str = "This URI does not exist";
const TIMEOUT_BODY: &str = "Server closed this connection";
const NOT_ACCEPTABLE_BODY: &str = "This request is not acceptable.";
const UNSUPPORTED_BODY: &str = "Unsupported Media Type";
const UPDATED_BODY: &str = "Resource is updated.";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no resource at {uri}")]
    ResourceNotFound { uri: String },

    #[error("request body of {length} bytes exceeds the limit of {max}")]
    BodyTooLarge { length: u64, max: usize },

    #[error("can't allocate {length} bytes for the request body")]
    OutOfMemory { length: usize },

    #[error("request body ended after {received} of {expected} bytes")]
    ShortRead { expected: usize, received: usize },

    #[error("timed out reading the request body")]
    Timeout,

    #[error("can't read request body: {source}")]
    Recv {
        #[source]
        source: RecvError,
    },

    #[error("accept header does not allow {media_type}")]
    NotAcceptable { media_type: MediaType },

    #[error("unsupported content type {content_type:?}")]
    UnsupportedMediaType { content_type: String },
}

impl DispatchError {
    pub fn resource_not_found<S: ToString>(uri: S) -> Self {
        Self::ResourceNotFound { uri: uri.to_string() }
    }

    pub fn unsupported_media_type<S: ToString>(content_type: S) -> Self {
        Self::UnsupportedMediaType { content_type: content_type.to_string() }
    }

    /// The status answered for this error, `None` when the exchange is aborted instead.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DispatchError::ResourceNotFound { .. } => Some(StatusCode::NOT_FOUND),
            DispatchError::Timeout => Some(StatusCode::REQUEST_TIMEOUT),
            DispatchError::NotAcceptable { .. } => Some(StatusCode::NOT_ACCEPTABLE),
            DispatchError::UnsupportedMediaType { .. } => Some(StatusCode::UNSUPPORTED_MEDIA_TYPE),
            DispatchError::BodyTooLarge { .. }
            | DispatchError::OutOfMemory { .. }
            | DispatchError::ShortRead { .. }
            | DispatchError::Recv { .. } => None,
        }
    }

    fn to_response(&self) -> Option<Response<Bytes>> {
        let response = match self {
            DispatchError::ResourceNotFound { .. } => html_response(StatusCode::NOT_FOUND, NOT_FOUND_BODY),
            DispatchError::Timeout => {
                let mut response = html_response(StatusCode::REQUEST_TIMEOUT, TIMEOUT_BODY);
                response.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
                response
            }
            DispatchError::NotAcceptable { .. } => html_response(StatusCode::NOT_ACCEPTABLE, NOT_ACCEPTABLE_BODY),
            DispatchError::UnsupportedMediaType { .. } => html_response(StatusCode::UNSUPPORTED_MEDIA_TYPE, UNSUPPORTED_BODY),
            _ => return None,
        };
        Some(response)
    }
}

impl From<RecvError> for DispatchError {
    fn from(e: RecvError) -> Self {
        match e {
            RecvError::Timeout => DispatchError::Timeout,
            source => DispatchError::Recv { source },
        }
    }
}

#[derive(Debug)]
pub struct Dispatcher {
    store: Arc<ResourceStore>,
    relay: Arc<CallbackRelay>,
    max_body_size: usize,
}

#[async_trait]
impl Handler for Dispatcher {
    async fn call(&self, request: &mut HttpRequest<'_>) -> Result<Response<Bytes>, HandlerError> {
        match self.dispatch(request).await {
            Ok(response) => Ok(response),
            Err(e) => match e.to_response() {
                Some(response) => {
                    debug!(cause = %e, path = request.path(), method = %request.method(), "request rejected");
                    Ok(response)
                }
                None => {
                    warn!(cause = %e, path = request.path(), method = %request.method(), "aborting request");
                    Err(Box::new(e))
                }
            },
        }
    }
}

impl Dispatcher {
    pub fn new(store: Arc<ResourceStore>, relay: Arc<CallbackRelay>, max_body_size: usize) -> Self {
        Self { store, relay, max_body_size }
    }

    pub async fn dispatch(&self, request: &mut HttpRequest<'_>) -> Result<Response<Bytes>, DispatchError> {
        let resource = self.store.find(request.path()).ok_or_else(|| DispatchError::resource_not_found(request.path()))?;

        let body = self.read_body(request).await?;
        let method = request.method().clone();

        let response = match method {
            Method::GET => get(request, &resource)?,
            Method::POST => post(request, &resource, &body)?,
            _ => html_response(StatusCode::OK, ""),
        };

        self.notify(&resource, method, body);
        Ok(response)
    }

    /// Reads exactly the declared body, an empty buffer when none is declared.
    async fn read_body(&self, request: &mut HttpRequest<'_>) -> Result<Bytes, DispatchError> {
        let declared = request.content_length();
        if declared == 0 {
            return Ok(Bytes::new());
        }

        let length = usize::try_from(declared)
            .ok()
            .filter(|length| *length <= self.max_body_size)
            .ok_or(DispatchError::BodyTooLarge { length: declared, max: self.max_body_size })?;

        let mut body = Vec::new();
        body.try_reserve_exact(length).map_err(|_e| DispatchError::OutOfMemory { length })?;
        body.resize(length, 0);

        let received = request.recv(&mut body).await?;
        ensure!(received == length, DispatchError::ShortRead { expected: length, received });

        trace!(length, "read request body");
        Ok(Bytes::from(body))
    }

    fn notify(&self, resource: &Resource, method: Method, body: Bytes) {
        let Some(mask) = Methods::from_method(&method) else {
            return;
        };
        let Some(callback) = resource.callback_for(mask) else {
            return;
        };

        self.relay.hand_off(CallbackMessage::new(callback, resource.shared_uri(), method, body));
    }
}

fn get(request: &HttpRequest<'_>, resource: &Resource) -> Result<Response<Bytes>, DispatchError> {
    let (media_type, value) = resource.snapshot();

    // an empty or unreadable Accept header counts as absent
    if let Some(accept) = request.header_value(ACCEPT).and_then(|value| value.to_str().ok()).filter(|accept| !accept.is_empty()) {
        ensure!(is_acceptable(accept, media_type), DispatchError::NotAcceptable { media_type });
    }

    Ok(typed_response(StatusCode::OK, media_type, value))
}

fn post(request: &HttpRequest<'_>, resource: &Resource, body: &Bytes) -> Result<Response<Bytes>, DispatchError> {
    let media_type = match request.header_value(CONTENT_TYPE) {
        Some(value) if !value.is_empty() => {
            let content_type = value.to_str().map_err(|_e| DispatchError::unsupported_media_type(String::from_utf8_lossy(value.as_bytes())))?;
            Some(media_type_id(content_type).ok_or_else(|| DispatchError::unsupported_media_type(content_type))?)
        }
        _ => None,
    };

    let value = (!body.is_empty()).then(|| body.clone());
    let updated = value.is_some();
    resource.apply_post(media_type, value);

    if updated {
        debug!(uri = resource.uri(), length = body.len(), "resource updated");
        Ok(html_response(StatusCode::OK, UPDATED_BODY))
    } else {
        Ok(html_response(StatusCode::OK, ""))
    }
}

fn typed_response(status: StatusCode, media_type: MediaType, body: Bytes) -> Response<Bytes> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(media_type.as_str()));
    response
}

fn html_response(status: StatusCode, body: &'static str) -> Response<Bytes> {
    typed_response(status, MediaType::Text, Bytes::from_static(body.as_bytes()))
}
