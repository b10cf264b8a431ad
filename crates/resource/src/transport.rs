//! The seam between the registry and the route table it keeps in lock-step with the store.

use std::sync::Arc;

use http::Method;
use micro_httpd::HttpdError;
use micro_httpd::handler::Handler;
use micro_httpd::routes::Routes;

/// Route registration as the registry needs it.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    fn register(&self, uri: &str, method: Method, handler: Arc<dyn Handler>) -> Result<(), HttpdError>;

    fn unregister(&self, uri: &str, method: &Method) -> Result<(), HttpdError>;

    fn unregister_uri(&self, uri: &str) -> Result<(), HttpdError>;
}

impl Transport for Routes {
    fn register(&self, uri: &str, method: Method, handler: Arc<dyn Handler>) -> Result<(), HttpdError> {
        Routes::register(self, uri, method, handler)
    }

    fn unregister(&self, uri: &str, method: &Method) -> Result<(), HttpdError> {
        Routes::unregister(self, uri, method)
    }

    fn unregister_uri(&self, uri: &str) -> Result<(), HttpdError> {
        Routes::unregister_uri(self, uri)
    }
}
