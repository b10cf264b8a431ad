//! The route table: exact `(uri, method) → handler` bindings.
//!
//! Routes may be added and removed while the server runs. Lookups take a read lock only long
//! enough to clone the handler out, so a handler never runs with the table locked.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::Method;
use parking_lot::RwLock;
use tracing::debug;

use crate::ensure;
use crate::error::HttpdError;
use crate::handler::Handler;

/// Default upper bound on the number of `(uri, method)` routes.
pub const DEFAULT_MAX_URI_HANDLERS: usize = 32;

type RouteKey = (Arc<str>, Method);

pub struct Routes {
    max_uri_handlers: usize,
    table: RwLock<HashMap<RouteKey, Arc<dyn Handler>>>,
}

/// Outcome of matching a request against the table.
pub enum RouteMatch {
    Found(Arc<dyn Handler>),
    /// The uri is known, but not for this method.
    MethodNotAllowed,
    NotFound,
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMatch::Found(_) => f.write_str("Found"),
            RouteMatch::MethodNotAllowed => f.write_str("MethodNotAllowed"),
            RouteMatch::NotFound => f.write_str("NotFound"),
        }
    }
}

impl fmt::Debug for Routes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.read();
        f.debug_struct("Routes").field("max_uri_handlers", &self.max_uri_handlers).field("routes", &table.keys().collect::<Vec<_>>()).finish()
    }
}

impl Default for Routes {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_URI_HANDLERS)
    }
}

impl Routes {
    pub fn new(max_uri_handlers: usize) -> Self {
        Self { max_uri_handlers, table: RwLock::new(HashMap::with_capacity(max_uri_handlers)) }
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    /// Binds `handler` to `(uri, method)`.
    ///
    /// # Errors
    ///
    /// - [`HttpdError::InvalidUri`] if `uri` does not start with `/`
    /// - [`HttpdError::HandlerExists`] if the pair is already bound
    /// - [`HttpdError::HandlersFull`] if the table holds `max_uri_handlers` routes
    pub fn register(&self, uri: &str, method: Method, handler: Arc<dyn Handler>) -> Result<(), HttpdError> {
        ensure!(uri.starts_with('/'), HttpdError::invalid_uri(uri));

        let mut table = self.table.write();
        let key: RouteKey = (Arc::from(uri), method);
        ensure!(!table.contains_key(&key), HttpdError::handler_exists(uri, key.1));
        ensure!(table.len() < self.max_uri_handlers, HttpdError::HandlersFull { max: self.max_uri_handlers });

        debug!(uri, method = %key.1, "registered route");
        table.insert(key, handler);
        Ok(())
    }

    /// Removes the route bound to `(uri, method)`.
    pub fn unregister(&self, uri: &str, method: &Method) -> Result<(), HttpdError> {
        let mut table = self.table.write();
        let key: RouteKey = (Arc::from(uri), method.clone());
        match table.remove(&key) {
            Some(_) => {
                debug!(uri, %method, "unregistered route");
                Ok(())
            }
            None => Err(HttpdError::handler_not_found(uri, Some(key.1))),
        }
    }

    /// Removes every route bound to `uri`, whatever its method.
    pub fn unregister_uri(&self, uri: &str) -> Result<(), HttpdError> {
        let mut table = self.table.write();
        let before = table.len();
        table.retain(|(route_uri, _), _| route_uri.as_ref() != uri);

        let removed = before - table.len();
        ensure!(removed > 0, HttpdError::handler_not_found(uri, None));

        debug!(uri, removed, "unregistered all routes of uri");
        Ok(())
    }

    /// Whether `(uri, method)` is currently bound.
    pub fn contains(&self, uri: &str, method: &Method) -> bool {
        self.table.read().keys().any(|(route_uri, route_method)| route_uri.as_ref() == uri && route_method == method)
    }

    /// Matches a request path and method against the table.
    pub fn lookup(&self, uri: &str, method: &Method) -> RouteMatch {
        let table = self.table.read();
        let mut uri_known = false;

        for ((route_uri, route_method), handler) in table.iter() {
            if route_uri.as_ref() != uri {
                continue;
            }
            if route_method == method {
                return RouteMatch::Found(Arc::clone(handler));
            }
            uri_known = true;
        }

        if uri_known { RouteMatch::MethodNotAllowed } else { RouteMatch::NotFound }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::make_handler;
    use bytes::Bytes;
    use http::Response;

    fn ok_handler() -> Arc<dyn Handler> {
        Arc::new(make_handler(|_request| Ok(Response::new(Bytes::new()))))
    }

    #[test]
    fn register_and_lookup() {
        let routes = Routes::default();
        routes.register("/temp", Method::GET, ok_handler()).unwrap();

        assert!(matches!(routes.lookup("/temp", &Method::GET), RouteMatch::Found(_)));
        assert!(matches!(routes.lookup("/temp", &Method::PUT), RouteMatch::MethodNotAllowed));
        assert!(matches!(routes.lookup("/humidity", &Method::GET), RouteMatch::NotFound));
        assert!(routes.contains("/temp", &Method::GET));
        assert!(!routes.contains("/temp", &Method::POST));
    }

    #[test]
    fn duplicate_route_is_rejected() {
        let routes = Routes::default();
        routes.register("/temp", Method::GET, ok_handler()).unwrap();

        let err = routes.register("/temp", Method::GET, ok_handler()).unwrap_err();
        assert!(matches!(err, HttpdError::HandlerExists { .. }));
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn table_capacity_is_enforced() {
        let routes = Routes::new(2);
        routes.register("/a", Method::GET, ok_handler()).unwrap();
        routes.register("/a", Method::POST, ok_handler()).unwrap();

        let err = routes.register("/b", Method::GET, ok_handler()).unwrap_err();
        assert!(matches!(err, HttpdError::HandlersFull { max: 2 }));

        routes.unregister("/a", &Method::POST).unwrap();
        routes.register("/b", Method::GET, ok_handler()).unwrap();
    }

    #[test]
    fn uri_must_be_absolute() {
        let routes = Routes::default();
        assert!(matches!(routes.register("temp", Method::GET, ok_handler()), Err(HttpdError::InvalidUri { .. })));
        assert!(routes.is_empty());
    }

    #[test]
    fn unregister_uri_removes_every_method() {
        let routes = Routes::default();
        routes.register("/temp", Method::GET, ok_handler()).unwrap();
        routes.register("/temp", Method::POST, ok_handler()).unwrap();
        routes.register("/humidity", Method::GET, ok_handler()).unwrap();

        routes.unregister_uri("/temp").unwrap();
        assert!(matches!(routes.lookup("/temp", &Method::GET), RouteMatch::NotFound));
        assert_eq!(routes.len(), 1);

        assert!(matches!(routes.unregister_uri("/temp"), Err(HttpdError::HandlerNotFound { method: None, .. })));
    }

    #[test]
    fn unregister_unknown_route() {
        let routes = Routes::default();
        let err = routes.unregister("/temp", &Method::DELETE).unwrap_err();
        assert!(matches!(err, HttpdError::HandlerNotFound { method: Some(Method::DELETE), .. }));
    }
}
