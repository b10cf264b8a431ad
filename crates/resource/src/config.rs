//! Server configuration, built in code or loaded from JSON.
//!
//! ```
//! use micro_resource::ServerConfig;
//!
//! let config: ServerConfig = serde_json::from_str(r#"{ "secure_port": 8443, "recv_timeout_ms": 2000 }"#).unwrap();
//! assert_eq!(config.secure_port, 8443);
//! assert_eq!(config.max_uri_handlers, 32);
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::ensure;
use crate::error::ServerError;
use crate::value::IntegerEncoding;

pub const DEFAULT_SECURE_PORT: u16 = 443;
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024;
pub const DEFAULT_RELAY_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    /// Starting on this port implies TLS.
    pub secure_port: u16,
    /// Route table capacity. Every resource takes two routes, plus one per callback-only method.
    pub max_uri_handlers: usize,
    /// Bound on every wait for request body bytes.
    #[serde(rename = "recv_timeout_ms", deserialize_with = "deserialize_millis")]
    pub recv_timeout: Duration,
    /// Largest request body the dispatcher buffers.
    pub max_body_size: usize,
    /// Callback messages that may wait for the relay thread.
    pub relay_capacity: usize,
    pub integer_encoding: IntegerEncoding,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            secure_port: DEFAULT_SECURE_PORT,
            max_uri_handlers: micro_httpd::routes::DEFAULT_MAX_URI_HANDLERS,
            recv_timeout: Duration::from_secs(5),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            relay_capacity: DEFAULT_RELAY_CAPACITY,
            integer_encoding: IntegerEncoding::Legacy,
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        ensure!(self.max_uri_handlers >= 2, ServerError::configuration("max_uri_handlers must leave room for one resource"));
        ensure!(self.relay_capacity > 0, ServerError::configuration("relay_capacity must be positive"));
        ensure!(!self.recv_timeout.is_zero(), ServerError::configuration("recv_timeout must be positive"));
        ensure!(self.max_body_size > 0, ServerError::configuration("max_body_size must be positive"));
        Ok(())
    }
}

#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    fn new() -> Self {
        Self { config: ServerConfig::default() }
    }

    pub fn bind_address(mut self, bind_address: impl Into<IpAddr>) -> Self {
        self.config.bind_address = bind_address.into();
        self
    }

    pub fn secure_port(mut self, secure_port: u16) -> Self {
        self.config.secure_port = secure_port;
        self
    }

    pub fn max_uri_handlers(mut self, max_uri_handlers: usize) -> Self {
        self.config.max_uri_handlers = max_uri_handlers;
        self
    }

    pub fn recv_timeout(mut self, recv_timeout: Duration) -> Self {
        self.config.recv_timeout = recv_timeout;
        self
    }

    pub fn max_body_size(mut self, max_body_size: usize) -> Self {
        self.config.max_body_size = max_body_size;
        self
    }

    pub fn relay_capacity(mut self, relay_capacity: usize) -> Self {
        self.config.relay_capacity = relay_capacity;
        self
    }

    pub fn integer_encoding(mut self, integer_encoding: IntegerEncoding) -> Self {
        self.config.integer_encoding = integer_encoding;
        self
    }

    pub fn build(self) -> Result<ServerConfig, ServerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn deserialize_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.secure_port, 443);
        assert_eq!(config.max_uri_handlers, 32);
        assert_eq!(config.recv_timeout, Duration::from_secs(5));
        assert_eq!(config.max_body_size, 16 * 1024);
        assert_eq!(config.relay_capacity, 16);
        assert_eq!(config.integer_encoding, IntegerEncoding::Legacy);
    }

    #[test]
    fn loads_json_with_defaults_for_missing_keys() {
        let json = indoc! {r#"
            {
                "bind_address": "127.0.0.1",
                "recv_timeout_ms": 1500,
                "integer_encoding": "widened"
            }
        "#};

        let config: ServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.bind_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.recv_timeout, Duration::from_millis(1500));
        assert_eq!(config.integer_encoding, IntegerEncoding::Widened);
        assert_eq!(config.secure_port, 443);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(serde_json::from_str::<ServerConfig>(r#"{ "port": 80 }"#).is_err());
    }

    #[test]
    fn builder_validates() {
        let config = ServerConfig::builder().bind_address(Ipv4Addr::LOCALHOST).max_body_size(512).build().unwrap();
        assert_eq!(config.max_body_size, 512);

        assert!(matches!(ServerConfig::builder().relay_capacity(0).build(), Err(ServerError::Configuration { .. })));
        assert!(matches!(ServerConfig::builder().max_uri_handlers(1).build(), Err(ServerError::Configuration { .. })));
        assert!(matches!(ServerConfig::builder().recv_timeout(Duration::ZERO).build(), Err(ServerError::Configuration { .. })));
    }
}
