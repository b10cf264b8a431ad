//! Keeps the resource store and the transport's route table in lock-step.
//!
//! Every resource owns its anchor routes (GET and POST to the dispatcher) for as long as it is
//! in the store; binding a callback may add PUT and DELETE routes. Each control operation runs
//! under one lock and either completes on both sides or leaves both sides as they were.

use std::fmt;
use std::sync::Arc;

use http::Method;
use micro_httpd::handler::Handler;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::ensure;
use crate::error::ServerError;
use crate::media_type::MediaType;
use crate::methods::Methods;
use crate::relay::ResourceCallback;
use crate::store::{Resource, ResourceStore};
use crate::transport::Transport;
use crate::value::ResourceValue;

/// Methods routed for every resource, the ones the dispatcher gives semantics to.
pub const ANCHOR_METHODS: Methods = Methods::GET.union(Methods::POST);

pub struct Registry {
    store: Arc<ResourceStore>,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<dyn Handler>,
    control: Mutex<()>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("store", &self.store).finish_non_exhaustive()
    }
}

impl Registry {
    pub fn new(store: Arc<ResourceStore>, transport: Arc<dyn Transport>, dispatcher: Arc<dyn Handler>) -> Self {
        Self { store, transport, dispatcher, control: Mutex::new(()) }
    }

    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }

    /// Routes the anchor methods of `uri`, then inserts the resource into the store.
    pub fn add_resource(&self, uri: &str, value: Option<ResourceValue>, media_type: MediaType) -> Result<Arc<Resource>, ServerError> {
        let _control = self.control.lock();
        ensure!(!self.store.contains(uri), ServerError::AlreadyExists { uri: uri.to_owned() });

        self.route_all(uri, ANCHOR_METHODS)?;

        match self.store.add(uri, value, media_type) {
            Ok(resource) => {
                resource.set_routed(ANCHOR_METHODS);
                Ok(resource)
            }
            Err(e) => {
                self.unroute_quietly(uri, ANCHOR_METHODS.iter());
                Err(e.into())
            }
        }
    }

    /// Drops every route of `uri`, then removes the resource from the store.
    pub fn remove_resource(&self, uri: &str) -> Result<Arc<Resource>, ServerError> {
        let _control = self.control.lock();
        ensure!(self.store.contains(uri), ServerError::not_found(uri));

        self.transport.unregister_uri(uri)?;
        Ok(self.store.remove(uri)?)
    }

    /// Records `callback` for `methods`, routing the ones that are not routed yet.
    pub fn bind_callback(&self, resource: &Resource, methods: Methods, callback: Arc<dyn ResourceCallback>) -> Result<(), ServerError> {
        let _control = self.control.lock();
        ensure!(resource.is_attached(), ServerError::not_found(resource.uri()));

        let newly_routed = methods.difference(resource.routed());
        self.route_all(resource.uri(), newly_routed)?;
        resource.bind_callback(methods, callback, newly_routed);

        debug!(uri = resource.uri(), ?methods, ?newly_routed, "bound callback");
        Ok(())
    }

    /// Forgets the callback for `methods`; routes outside the anchor set go away with it.
    pub fn unbind_callback(&self, resource: &Resource, methods: Methods) -> Result<(), ServerError> {
        let _control = self.control.lock();
        ensure!(resource.is_attached(), ServerError::not_found(resource.uri()));

        let unrouted = methods.intersection(resource.routed()).difference(ANCHOR_METHODS);
        self.unroute_all(resource.uri(), unrouted)?;
        resource.unbind_callback(methods, unrouted);

        debug!(uri = resource.uri(), ?methods, ?unrouted, "unbound callback");
        Ok(())
    }

    /// Empties the store and drops the routes of every resource that was in it.
    pub fn teardown(&self) {
        let _control = self.control.lock();

        let resources = self.store.drain();
        for resource in &resources {
            if let Err(e) = self.transport.unregister_uri(resource.uri()) {
                warn!(uri = resource.uri(), cause = %e, "can't unregister routes during teardown");
            }
        }
        info!(count = resources.len(), "unregistered all resources");
    }

    /// Routes every method of `methods` to the dispatcher, none of them on failure.
    fn route_all(&self, uri: &str, methods: Methods) -> Result<(), ServerError> {
        let mut routed: Vec<Method> = Vec::new();
        for method in methods.iter() {
            if let Err(e) = self.transport.register(uri, method.clone(), Arc::clone(&self.dispatcher)) {
                warn!(uri, %method, cause = %e, "can't route method, unwinding");
                self.unroute_quietly(uri, routed);
                return Err(e.into());
            }
            routed.push(method);
        }
        Ok(())
    }

    /// Drops the routes of every method of `methods`, restoring them on failure.
    fn unroute_all(&self, uri: &str, methods: Methods) -> Result<(), ServerError> {
        let mut unrouted: Vec<Method> = Vec::new();
        for method in methods.iter() {
            if let Err(e) = self.transport.unregister(uri, &method) {
                warn!(uri, %method, cause = %e, "can't unroute method, restoring");
                for method in unrouted {
                    if let Err(e) = self.transport.register(uri, method, Arc::clone(&self.dispatcher)) {
                        warn!(uri, cause = %e, "can't restore route");
                    }
                }
                return Err(e.into());
            }
            unrouted.push(method);
        }
        Ok(())
    }

    fn unroute_quietly(&self, uri: &str, methods: impl IntoIterator<Item = Method>) {
        for method in methods {
            if let Err(e) = self.transport.unregister(uri, &method) {
                warn!(uri, %method, cause = %e, "can't unwind route");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use bytes::Bytes;
    use http::Response;
    use micro_httpd::HttpdError;
    use micro_httpd::handler::make_handler;
    use micro_httpd::routes::Routes;
    use mockall::Sequence;
    use mockall::predicate::eq;

    fn noop_handler() -> Arc<dyn Handler> {
        Arc::new(make_handler(|_request| Ok(Response::new(Bytes::new()))))
    }

    fn noop_callback() -> Arc<dyn ResourceCallback> {
        Arc::new(|_: &str, _: &Method, _: &Bytes| {})
    }

    fn registry_over(transport: Arc<dyn Transport>) -> Registry {
        Registry::new(Arc::new(ResourceStore::default()), transport, noop_handler())
    }

    #[test]
    fn add_routes_anchor_methods() {
        let routes = Arc::new(Routes::default());
        let registry = registry_over(Arc::clone(&routes) as Arc<dyn Transport>);

        let resource = registry.add_resource("/temp", None, MediaType::Json).unwrap();
        assert!(routes.contains("/temp", &Method::GET));
        assert!(routes.contains("/temp", &Method::POST));
        assert!(!routes.contains("/temp", &Method::PUT));
        assert_eq!(resource.routed(), ANCHOR_METHODS);
    }

    #[test]
    fn duplicate_add_leaves_routes_alone() {
        let routes = Arc::new(Routes::default());
        let registry = registry_over(Arc::clone(&routes) as Arc<dyn Transport>);

        registry.add_resource("/temp", None, MediaType::Json).unwrap();
        let err = registry.add_resource("/temp", None, MediaType::Json).unwrap_err();
        assert!(matches!(err, ServerError::AlreadyExists { .. }));
        assert_eq!(routes.len(), 2);
    }

    #[test]
    fn failed_anchor_route_is_unwound() {
        let mut transport = MockTransport::new();
        let mut seq = Sequence::new();
        transport.expect_register().withf(|uri, method, _| uri == "/temp" && method == Method::GET).times(1).in_sequence(&mut seq).returning(|_, _, _| Ok(()));
        transport
            .expect_register()
            .withf(|_, method, _| method == Method::POST)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(HttpdError::HandlersFull { max: 1 }));
        transport.expect_unregister().with(eq("/temp"), eq(Method::GET)).times(1).in_sequence(&mut seq).returning(|_, _| Ok(()));

        let registry = registry_over(Arc::new(transport));
        let err = registry.add_resource("/temp", None, MediaType::Text).unwrap_err();

        assert_eq!(err.transport_code(), Some(0xb001));
        assert!(registry.store().is_empty());
    }

    #[test]
    fn full_route_table_keeps_store_and_routes_in_step() {
        let routes = Arc::new(Routes::new(3));
        let registry = registry_over(Arc::clone(&routes) as Arc<dyn Transport>);

        registry.add_resource("/a", None, MediaType::Text).unwrap();
        assert!(registry.add_resource("/b", None, MediaType::Text).is_err());

        assert!(registry.store().find("/b").is_none());
        assert!(!routes.contains("/b", &Method::GET));
        assert_eq!(routes.len(), 2);
    }

    #[test]
    fn remove_drops_all_routes() {
        let routes = Arc::new(Routes::default());
        let registry = registry_over(Arc::clone(&routes) as Arc<dyn Transport>);

        let resource = registry.add_resource("/temp", None, MediaType::Text).unwrap();
        registry.bind_callback(&resource, Methods::PUT, noop_callback()).unwrap();
        assert_eq!(routes.len(), 3);

        registry.remove_resource("/temp").unwrap();
        assert!(routes.is_empty());
        assert!(!resource.is_attached());
        assert!(matches!(registry.remove_resource("/temp"), Err(ServerError::NotFound { .. })));
    }

    #[test]
    fn bind_routes_only_missing_methods() {
        let routes = Arc::new(Routes::default());
        let registry = registry_over(Arc::clone(&routes) as Arc<dyn Transport>);
        let resource = registry.add_resource("/temp", None, MediaType::Text).unwrap();

        registry.bind_callback(&resource, Methods::GET | Methods::DELETE, noop_callback()).unwrap();
        assert!(routes.contains("/temp", &Method::DELETE));
        assert_eq!(routes.len(), 3);
        assert_eq!(resource.callback_methods(), Methods::GET | Methods::DELETE);

        registry.unbind_callback(&resource, Methods::GET | Methods::DELETE).unwrap();
        assert!(!routes.contains("/temp", &Method::DELETE));
        // anchor routes stay
        assert!(routes.contains("/temp", &Method::GET));
        assert!(resource.callback_for(Methods::GET).is_none());
    }

    #[test]
    fn failed_bind_unwinds_earlier_methods() {
        let mut transport = MockTransport::new();
        transport.expect_register().withf(|_, method, _| *method != Method::DELETE).returning(|_, _, _| Ok(()));
        transport.expect_register().withf(|_, method, _| method == Method::DELETE).times(1).returning(|uri, method, _| Err(HttpdError::handler_exists(uri, method)));
        transport.expect_unregister().with(eq("/temp"), eq(Method::PUT)).times(1).returning(|_, _| Ok(()));

        let registry = registry_over(Arc::new(transport));
        let resource = registry.add_resource("/temp", None, MediaType::Text).unwrap();

        let err = registry.bind_callback(&resource, Methods::PUT | Methods::DELETE, noop_callback()).unwrap_err();
        assert_eq!(err.transport_code(), Some(0xb002));
        assert_eq!(resource.routed(), ANCHOR_METHODS);
        assert!(resource.callback_methods().is_empty());
    }

    #[test]
    fn failed_unbind_restores_routes() {
        let mut transport = MockTransport::new();
        transport.expect_register().withf(|_, method, _| *method != Method::PUT).times(3).returning(|_, _, _| Ok(()));
        // routed once by the bind, once more when the failed unbind restores it
        transport.expect_register().withf(|_, method, _| method == Method::PUT).times(2).returning(|_, _, _| Ok(()));
        transport.expect_unregister().with(eq("/temp"), eq(Method::PUT)).times(1).returning(|_, _| Ok(()));
        transport
            .expect_unregister()
            .with(eq("/temp"), eq(Method::DELETE))
            .times(1)
            .returning(|uri, method| Err(HttpdError::handler_not_found(uri, Some(method.clone()))));

        let registry = registry_over(Arc::new(transport));
        let resource = registry.add_resource("/temp", None, MediaType::Text).unwrap();
        registry.bind_callback(&resource, Methods::PUT | Methods::DELETE, noop_callback()).unwrap();

        assert!(registry.unbind_callback(&resource, Methods::PUT | Methods::DELETE).is_err());
        assert_eq!(resource.routed(), Methods::ALL);
        assert_eq!(resource.callback_methods(), Methods::PUT | Methods::DELETE);
    }

    #[test]
    fn detached_resource_can_not_bind() {
        let routes = Arc::new(Routes::default());
        let registry = registry_over(Arc::clone(&routes) as Arc<dyn Transport>);
        let resource = registry.add_resource("/temp", None, MediaType::Text).unwrap();
        registry.remove_resource("/temp").unwrap();

        let err = registry.bind_callback(&resource, Methods::PUT, noop_callback()).unwrap_err();
        assert!(matches!(err, ServerError::NotFound { .. }));
        assert!(routes.is_empty());
    }

    #[test]
    fn teardown_unregisters_everything() {
        let routes = Arc::new(Routes::default());
        let registry = registry_over(Arc::clone(&routes) as Arc<dyn Transport>);
        let a = registry.add_resource("/a", None, MediaType::Text).unwrap();
        registry.add_resource("/b", None, MediaType::Text).unwrap();

        registry.teardown();
        assert!(routes.is_empty());
        assert!(registry.store().is_empty());
        assert!(!a.is_attached());
    }
}
