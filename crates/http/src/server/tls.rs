//! Builds the rustls acceptor from PEM material.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use rustls::ServerConfig;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;

use crate::ensure;
use crate::error::HttpdError;

/// PEM encoded certificate chain and private key of the server.
#[derive(Clone)]
pub struct TlsMaterial {
    pub certificate: Bytes,
    pub private_key: Bytes,
}

impl TlsMaterial {
    pub fn new(certificate: impl Into<Bytes>, private_key: impl Into<Bytes>) -> Self {
        Self { certificate: certificate.into(), private_key: private_key.into() }
    }
}

impl fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("certificate_len", &self.certificate.len())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

pub(crate) fn acceptor(material: &TlsMaterial) -> Result<TlsAcceptor, HttpdError> {
    let certs = CertificateDer::pem_slice_iter(&material.certificate)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| HttpdError::tls(format!("can't parse certificate: {e}")))?;
    ensure!(!certs.is_empty(), HttpdError::tls("no certificate found in PEM"));

    let key = PrivateKeyDer::from_pem_slice(&material.private_key).map_err(|e| HttpdError::tls(format!("can't parse private key: {e}")))?;

    let config = ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(HttpdError::tls)?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(HttpdError::tls)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}
