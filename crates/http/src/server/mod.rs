//! The listener side of the transport.
//!
//! [`HttpServer::start`] binds the listening socket, optionally prepares a TLS acceptor and
//! spawns the accept loop. Every accepted connection runs as its own task on a shared
//! [`TaskTracker`], so [`HttpServer::shutdown`] can stop accepting, cancel live connections
//! and wait until all of them are gone.

mod tls;

pub use tls::TlsMaterial;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::select;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::connection::HttpConnection;
use crate::error::HttpdError;
use crate::routes::{DEFAULT_MAX_URI_HANDLERS, Routes};

/// How accepted connections are carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Plain,
    Tls,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Plain => f.write_str("plain"),
            TransportMode::Tls => f.write_str("tls"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    pub max_uri_handlers: usize,
    /// Bound on every wait for request body bytes, and on the TLS handshake.
    pub recv_timeout: Duration,
    /// Serve TLS with this material, plain TCP when absent.
    pub tls: Option<TlsMaterial>,
}

impl HttpServerConfig {
    /// A plain TCP configuration listening on all interfaces.
    pub fn insecure(port: u16) -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port,
            max_uri_handlers: DEFAULT_MAX_URI_HANDLERS,
            recv_timeout: Duration::from_secs(5),
            tls: None,
        }
    }

    /// A TLS configuration listening on all interfaces.
    pub fn secure(port: u16, tls: TlsMaterial) -> Self {
        Self { tls: Some(tls), ..Self::insecure(port) }
    }

    pub fn transport_mode(&self) -> TransportMode {
        if self.tls.is_some() { TransportMode::Tls } else { TransportMode::Plain }
    }
}

/// A running server. Dropping it stops the accept loop and every live connection.
#[derive(Debug)]
pub struct HttpServer {
    routes: Arc<Routes>,
    local_addr: SocketAddr,
    mode: TransportMode,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl HttpServer {
    pub async fn start(config: HttpServerConfig) -> Result<Self, HttpdError> {
        let mode = config.transport_mode();
        let acceptor = config.tls.as_ref().map(tls::acceptor).transpose()?;

        let address = SocketAddr::new(config.bind_address, config.port);
        let listener = TcpListener::bind(address).await.map_err(|source| HttpdError::Bind { address, source })?;
        let local_addr = listener.local_addr().map_err(|source| HttpdError::Bind { address, source })?;

        let routes = Arc::new(Routes::new(config.max_uri_handlers));
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();

        let accept_loop = AcceptLoop {
            listener,
            acceptor,
            routes: Arc::clone(&routes),
            recv_timeout: config.recv_timeout,
            shutdown: shutdown.clone(),
            tracker: tracker.clone(),
        };
        tracker.spawn(accept_loop.run());

        info!(%local_addr, %mode, max_uri_handlers = config.max_uri_handlers, "http server started");
        Ok(Self { routes, local_addr, mode, shutdown, tracker })
    }

    /// The live route table, routes can be changed while the server runs.
    pub fn routes(&self) -> &Arc<Routes> {
        &self.routes
    }

    /// The bound address, useful when started on port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn transport_mode(&self) -> TransportMode {
        self.mode
    }

    /// Stops accepting, cancels live connections and waits until every task is gone.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!(local_addr = %self.local_addr, "http server stopped");
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct AcceptLoop {
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    routes: Arc<Routes>,
    recv_timeout: Duration,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl AcceptLoop {
    async fn run(self) {
        loop {
            let (tcp_stream, remote_addr) = select! {
                () = self.shutdown.cancelled() => {
                    info!("stop accepting connections");
                    return;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(stream_and_addr) => stream_and_addr,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept");
                        continue;
                    }
                },
            };

            debug!(%remote_addr, "accepted connection");

            let connection = Connection {
                tcp_stream,
                acceptor: self.acceptor.clone(),
                routes: Arc::clone(&self.routes),
                recv_timeout: self.recv_timeout,
            };
            let shutdown = self.shutdown.clone();

            self.tracker.spawn(async move {
                select! {
                    () = shutdown.cancelled() => debug!(%remote_addr, "connection cancelled by shutdown"),
                    () = connection.serve() => {}
                }
            });
        }
    }
}

struct Connection {
    tcp_stream: TcpStream,
    acceptor: Option<TlsAcceptor>,
    routes: Arc<Routes>,
    recv_timeout: Duration,
}

impl Connection {
    async fn serve(self) {
        let result = match self.acceptor {
            None => {
                let (reader, writer) = self.tcp_stream.into_split();
                HttpConnection::new(reader, writer, self.routes, self.recv_timeout).process().await
            }
            Some(acceptor) => {
                let tls_stream = match timeout(self.recv_timeout, acceptor.accept(self.tcp_stream)).await {
                    Ok(Ok(tls_stream)) => tls_stream,
                    Ok(Err(e)) => {
                        warn!(cause = %e, "tls handshake failed");
                        return;
                    }
                    Err(_elapsed) => {
                        warn!("tls handshake timed out");
                        return;
                    }
                };
                let (reader, writer) = tokio::io::split(tls_stream);
                HttpConnection::new(reader, writer, self.routes, self.recv_timeout).process().await
            }
        };

        match result {
            Ok(()) => info!("finished process, connection shutdown"),
            Err(e) => error!(cause = %e, "service has error, connection shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::make_handler;
    use bytes::Bytes;
    use http::{Method, Response};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn local_config() -> HttpServerConfig {
        HttpServerConfig { bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST), ..HttpServerConfig::insecure(0) }
    }

    #[tokio::test]
    async fn serves_registered_route() {
        let server = HttpServer::start(local_config()).await.unwrap();
        assert_eq!(server.transport_mode(), TransportMode::Plain);

        let handler = make_handler(|_request| Ok(Response::new(Bytes::from_static(b"pong"))));
        server.routes().register("/ping", Method::GET, Arc::new(handler)).unwrap();

        let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
        stream.write_all(b"GET /ping HTTP/1.1\r\nConnection: close\r\n\r\n").await.unwrap();

        let mut output = String::new();
        stream.read_to_string(&mut output).await.unwrap();
        assert!(output.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(output.ends_with("pong"));

        server.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_closes_idle_connections() {
        let server = HttpServer::start(local_config()).await.unwrap();
        let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();

        server.shutdown().await;

        let mut buf = [0u8; 16];
        assert_eq!(stream.read(&mut buf).await.unwrap_or(0), 0);
        assert!(TcpStream::connect(server.local_addr()).await.is_err());
    }

    #[tokio::test]
    async fn invalid_tls_material_fails_start() {
        let config = HttpServerConfig::secure(0, TlsMaterial::new("", ""));
        assert_eq!(config.transport_mode(), TransportMode::Tls);
        assert!(matches!(HttpServer::start(config).await, Err(HttpdError::Tls { .. })));
    }
}
