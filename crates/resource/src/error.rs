use std::io;

use micro_httpd::HttpdError;
use thiserror::Error;
use tokio::task::JoinError;

use crate::store::StoreError;

/// Failures of the lifecycle and registry operations of a [`ResourceServer`](crate::ResourceServer).
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("server is already initialized")]
    AlreadyInitialized,

    #[error("server is not initialized")]
    NotInitialized,

    #[error("resource {uri} already exists")]
    AlreadyExists { uri: String },

    #[error("resource {uri} not found")]
    NotFound { uri: String },

    #[error("transport failure ({code:#x}): {source}")]
    Transport {
        code: i32,
        #[source]
        source: HttpdError,
    },

    #[error("can't start callback relay: {source}")]
    Relay {
        #[source]
        source: io::Error,
    },

    #[error("lifecycle task didn't finish: {source}")]
    Lifecycle {
        #[from]
        source: JoinError,
    },
}

impl ServerError {
    pub fn configuration<S: ToString>(reason: S) -> Self {
        Self::Configuration { reason: reason.to_string() }
    }

    pub fn not_found<S: ToString>(uri: S) -> Self {
        Self::NotFound { uri: uri.to_string() }
    }

    /// The native transport status code, if the failure came from the transport.
    pub fn transport_code(&self) -> Option<i32> {
        match self {
            ServerError::Transport { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<HttpdError> for ServerError {
    fn from(source: HttpdError) -> Self {
        Self::Transport { code: source.code(), source }
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyExists { uri } => Self::AlreadyExists { uri },
            StoreError::NotFound { uri } => Self::NotFound { uri },
        }
    }
}
