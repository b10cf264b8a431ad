//! The lifecycle of a resource server and the handles of its resources.
//!
//! A [`ResourceServer`] is either uninitialized or running one transport. [`ResourceServer::init`]
//! starts the callback relay and the transport; [`ResourceServer::shutdown`] unregisters every
//! resource, stops the transport, drains the relay and leaves the server ready for the next
//! `init`.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use micro_httpd::routes::Routes;
use micro_httpd::server::{HttpServer, HttpServerConfig, TlsMaterial, TransportMode};
use parking_lot::Mutex;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::media_type::MediaType;
use crate::methods::Methods;
use crate::registry::Registry;
use crate::relay::{CallbackRelay, ResourceCallback};
use crate::store::{Resource, ResourceStore};
use crate::value::ResourceValue;

enum State {
    Uninitialized,
    Starting,
    Running(Running),
    Stopping,
}

struct Running {
    http: HttpServer,
    relay: Arc<CallbackRelay>,
    registry: Arc<Registry>,
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Uninitialized => f.write_str("Uninitialized"),
            State::Starting => f.write_str("Starting"),
            State::Running(running) => f.debug_tuple("Running").field(&running.http.local_addr()).finish(),
            State::Stopping => f.write_str("Stopping"),
        }
    }
}

#[derive(Debug)]
pub struct ResourceServer {
    config: ServerConfig,
    state: Arc<Mutex<State>>,
}

impl Default for ResourceServer {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl ResourceServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config, state: Arc::new(Mutex::new(State::Uninitialized)) }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Starts serving on `port`.
    ///
    /// TLS is used when `port` is the configured secure port or when any PEM material is
    /// supplied, in which case both the private key and the certificate must be present.
    ///
    /// Start-up runs on its own task: dropping the returned future doesn't stop it, and the
    /// server ends up either running or uninitialized.
    ///
    /// # Errors
    ///
    /// - [`ServerError::AlreadyInitialized`] unless the server is uninitialized
    /// - [`ServerError::Configuration`] for invalid configuration or incomplete TLS material
    /// - [`ServerError::Transport`] when the transport can't start, with its native code
    pub async fn init(&self, port: u16, keyfile: Option<Bytes>, certfile: Option<Bytes>) -> Result<(), ServerError> {
        let transition = {
            let mut state = self.state.lock();
            if !matches!(*state, State::Uninitialized) {
                return Err(ServerError::AlreadyInitialized);
            }
            *state = State::Starting;
            Transition::new(&self.state)
        };

        let config = self.config.clone();
        let task = tokio::spawn(async move {
            match start(&config, port, keyfile, certfile).await {
                Ok(running) => {
                    info!(local_addr = %running.http.local_addr(), mode = %running.http.transport_mode(), "resource server started");
                    transition.finish(State::Running(running));
                    Ok(())
                }
                Err(e) => {
                    error!(port, cause = %e, "can't start resource server");
                    transition.finish(State::Uninitialized);
                    Err(e)
                }
            }
        });

        task.await?
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), State::Running(_))
    }

    /// The bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.state.lock() {
            State::Running(running) => Some(running.http.local_addr()),
            _ => None,
        }
    }

    pub fn transport_mode(&self) -> Option<TransportMode> {
        match &*self.state.lock() {
            State::Running(running) => Some(running.http.transport_mode()),
            _ => None,
        }
    }

    fn registry(&self) -> Result<Arc<Registry>, ServerError> {
        match &*self.state.lock() {
            State::Running(running) => Ok(Arc::clone(&running.registry)),
            _ => Err(ServerError::NotInitialized),
        }
    }

    /// Creates a resource and routes it; a missing value is a single zero byte and a missing
    /// media type is `text/html`.
    pub fn add_resource(&self, uri: &str, value: Option<ResourceValue>, media_type: Option<MediaType>) -> Result<ResourceHandle, ServerError> {
        let registry = self.registry()?;
        let resource = registry.add_resource(uri, value, media_type.unwrap_or_default())?;

        info!(uri, media_type = %resource.media_type(), "resource added");
        Ok(ResourceHandle { resource, registry: Arc::downgrade(&registry) })
    }

    pub fn remove_resource(&self, uri: &str) -> Result<(), ServerError> {
        self.registry()?.remove_resource(uri)?;
        info!(uri, "resource removed");
        Ok(())
    }

    /// A handle to the resource at `uri`, if there is one.
    pub fn resource(&self, uri: &str) -> Result<ResourceHandle, ServerError> {
        let registry = self.registry()?;
        let resource = registry.store().find(uri).ok_or_else(|| ServerError::not_found(uri))?;
        Ok(ResourceHandle { resource, registry: Arc::downgrade(&registry) })
    }

    /// Unregisters every resource, stops the transport, then delivers the queued callbacks
    /// and stops the relay.
    ///
    /// Teardown runs on its own task and always completes, even if the returned future is
    /// dropped.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        let (running, transition) = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, State::Stopping) {
                State::Running(running) => (running, Transition::new(&self.state)),
                other => {
                    *state = other;
                    return Err(ServerError::NotInitialized);
                }
            }
        };

        let task = tokio::spawn(async move {
            running.registry.teardown();
            running.http.shutdown().await;
            running.relay.shutdown().await;

            transition.finish(State::Uninitialized);
            info!("resource server stopped");
        });

        task.await?;
        Ok(())
    }
}

async fn start(config: &ServerConfig, port: u16, keyfile: Option<Bytes>, certfile: Option<Bytes>) -> Result<Running, ServerError> {
    config.validate()?;
    let tls = tls_material(config, port, keyfile, certfile)?;

    let relay = Arc::new(CallbackRelay::start(config.relay_capacity).map_err(|source| ServerError::Relay { source })?);

    let http_config = HttpServerConfig {
        bind_address: config.bind_address,
        port,
        max_uri_handlers: config.max_uri_handlers,
        recv_timeout: config.recv_timeout,
        tls,
    };
    let http = match HttpServer::start(http_config).await {
        Ok(http) => http,
        Err(e) => {
            relay.shutdown().await;
            return Err(e.into());
        }
    };

    let store = Arc::new(ResourceStore::new(config.integer_encoding));
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&store), Arc::clone(&relay), config.max_body_size));
    let routes: Arc<Routes> = Arc::clone(http.routes());
    let registry = Arc::new(Registry::new(store, routes, dispatcher));

    Ok(Running { http, relay, registry })
}

fn tls_material(config: &ServerConfig, port: u16, keyfile: Option<Bytes>, certfile: Option<Bytes>) -> Result<Option<TlsMaterial>, ServerError> {
    let secure = port == config.secure_port || keyfile.is_some() || certfile.is_some();
    if !secure {
        return Ok(None);
    }

    match (certfile, keyfile) {
        (Some(certificate), Some(private_key)) => Ok(Some(TlsMaterial::new(certificate, private_key))),
        (None, _) => Err(ServerError::configuration("tls requires a certificate")),
        (_, None) => Err(ServerError::configuration("tls requires a private key")),
    }
}

/// A lifecycle change in progress.
///
/// The server stays `Starting` or `Stopping` while this is alive. Dropping it unfinished,
/// which happens when the lifecycle task panics or is aborted, leaves the server uninitialized.
struct Transition {
    state: Arc<Mutex<State>>,
    finished: bool,
}

impl Transition {
    fn new(state: &Arc<Mutex<State>>) -> Self {
        Self { state: Arc::clone(state), finished: false }
    }

    fn finish(mut self, next: State) {
        *self.state.lock() = next;
        self.finished = true;
    }
}

impl Drop for Transition {
    fn drop(&mut self) {
        if !self.finished {
            *self.state.lock() = State::Uninitialized;
        }
    }
}

/// A resource added through [`ResourceServer::add_resource`].
///
/// Once the resource is removed, or its server shut down, every operation fails with
/// [`ServerError::NotFound`].
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    resource: Arc<Resource>,
    registry: Weak<Registry>,
}

impl ResourceHandle {
    pub fn uri(&self) -> &str {
        self.resource.uri()
    }

    pub fn is_attached(&self) -> bool {
        self.resource.is_attached()
    }

    pub fn value(&self) -> Result<Bytes, ServerError> {
        self.attached()?;
        Ok(self.resource.value())
    }

    pub fn media_type(&self) -> Result<MediaType, ServerError> {
        self.attached()?;
        Ok(self.resource.media_type())
    }

    pub fn set_value(&self, value: impl Into<ResourceValue>) -> Result<(), ServerError> {
        let registry = self.registry()?;
        registry.store().update_value(&self.resource, value.into());
        Ok(())
    }

    /// Binds (`action == true`) or unbinds the callback for the methods of `mask`
    /// (GET=1, PUT=2, POST=4, DELETE=8).
    pub fn callback(&self, mask: u8, callback: Option<Arc<dyn ResourceCallback>>, action: bool) -> Result<(), ServerError> {
        let methods = Methods::from_bits(mask).ok_or_else(|| ServerError::configuration(format!("invalid method mask {mask:#x}")))?;

        if action {
            let callback = callback.ok_or_else(|| ServerError::configuration("binding requires a callback"))?;
            self.bind_shared(methods, callback)
        } else {
            self.unbind_callback(methods)
        }
    }

    pub fn bind_callback<C: ResourceCallback>(&self, methods: Methods, callback: C) -> Result<(), ServerError> {
        self.bind_shared(methods, Arc::new(callback))
    }

    fn bind_shared(&self, methods: Methods, callback: Arc<dyn ResourceCallback>) -> Result<(), ServerError> {
        if methods.is_empty() {
            return Err(ServerError::configuration("empty method mask"));
        }
        self.registry()?.bind_callback(&self.resource, methods, callback)
    }

    pub fn unbind_callback(&self, methods: Methods) -> Result<(), ServerError> {
        if methods.is_empty() {
            return Err(ServerError::configuration("empty method mask"));
        }
        self.registry()?.unbind_callback(&self.resource, methods)
    }

    fn attached(&self) -> Result<(), ServerError> {
        if self.resource.is_attached() { Ok(()) } else { Err(ServerError::not_found(self.resource.uri())) }
    }

    fn registry(&self) -> Result<Arc<Registry>, ServerError> {
        self.attached()?;
        self.registry.upgrade().ok_or_else(|| ServerError::not_found(self.resource.uri()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use std::net::{Ipv4Addr, TcpListener};

    fn local_server() -> ResourceServer {
        ResourceServer::new(ServerConfig::builder().bind_address(Ipv4Addr::LOCALHOST).build().unwrap())
    }

    fn noop(_: &str, _: &Method, _: &Bytes) {}

    #[tokio::test]
    async fn operations_need_a_running_server() {
        let server = local_server();
        assert!(matches!(server.add_resource("/temp", None, None), Err(ServerError::NotInitialized)));
        assert!(matches!(server.remove_resource("/temp"), Err(ServerError::NotInitialized)));
        assert!(matches!(server.shutdown().await, Err(ServerError::NotInitialized)));
        assert_eq!(server.local_addr(), None);
    }

    #[tokio::test]
    async fn init_twice_fails() {
        let server = local_server();
        server.init(0, None, None).await.unwrap();
        assert_eq!(server.transport_mode(), Some(TransportMode::Plain));

        assert!(matches!(server.init(0, None, None).await, Err(ServerError::AlreadyInitialized)));
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn incomplete_tls_material_fails_before_start() {
        let server = local_server();

        let err = server.init(0, Some(Bytes::from_static(b"key")), None).await.unwrap_err();
        assert!(matches!(err, ServerError::Configuration { .. }));
        // the secure port implies tls
        let err = server.init(443, None, None).await.unwrap_err();
        assert!(matches!(err, ServerError::Configuration { .. }));
        assert!(!server.is_running());

        server.init(0, None, None).await.unwrap();
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn port_in_use_reports_the_transport_code() {
        let occupied = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = occupied.local_addr().unwrap().port();

        let server = local_server();
        let err = server.init(port, None, None).await.unwrap_err();
        assert_eq!(err.transport_code(), Some(micro_httpd::error::code::TASK));
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn handle_follows_the_resource() {
        let server = local_server();
        server.init(0, None, None).await.unwrap();

        let handle = server.add_resource("/temp", Some(20u32.into()), Some(MediaType::Octet)).unwrap();
        assert_eq!(handle.value().unwrap(), Bytes::from_static(&[20]));
        handle.set_value("21.5").unwrap();
        assert_eq!(server.resource("/temp").unwrap().value().unwrap(), Bytes::from_static(b"21.5"));

        assert!(matches!(server.add_resource("/temp", None, None), Err(ServerError::AlreadyExists { .. })));

        server.remove_resource("/temp").unwrap();
        assert!(matches!(handle.value(), Err(ServerError::NotFound { .. })));
        assert!(matches!(handle.set_value(1u32), Err(ServerError::NotFound { .. })));
        assert!(matches!(server.remove_resource("/temp"), Err(ServerError::NotFound { .. })));

        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn callback_arguments_are_validated() {
        let server = local_server();
        server.init(0, None, None).await.unwrap();
        let handle = server.add_resource("/temp", None, None).unwrap();

        assert!(matches!(handle.callback(0x10, Some(Arc::new(noop)), true), Err(ServerError::Configuration { .. })));
        assert!(matches!(handle.callback(0, Some(Arc::new(noop)), true), Err(ServerError::Configuration { .. })));
        assert!(matches!(handle.callback(2, None, true), Err(ServerError::Configuration { .. })));

        handle.callback(2 | 8, Some(Arc::new(noop)), true).unwrap();
        handle.callback(2 | 8, None, false).unwrap();

        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_detaches_handles_and_allows_restart() {
        let server = local_server();
        server.init(0, None, None).await.unwrap();
        let handle = server.add_resource("/temp", None, None).unwrap();

        server.shutdown().await.unwrap();
        assert!(!server.is_running());
        assert!(!handle.is_attached());
        assert!(matches!(handle.bind_callback(Methods::GET, noop), Err(ServerError::NotFound { .. })));

        server.init(0, None, None).await.unwrap();
        assert!(server.resource("/temp").is_err());
        server.add_resource("/temp", None, None).unwrap();
        server.shutdown().await.unwrap();
    }
}
