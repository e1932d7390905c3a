//! TLS/SSL infrastructure.
//!
//! Provides trait-based abstractions for TLS configuration and connection handling.

use crate::error::AppError;
use rustls_pki_types::ServerName;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};

/// ALPN identifiers offered to the server, most preferred first.
pub const ALPN_H2: &[u8] = b"h2";
pub const ALPN_HTTP11: &[u8] = b"http/1.1";

/// Trait for TLS configuration providers.
///
/// This abstraction allows for different TLS configurations
/// and makes testing easier by allowing mock implementations.
pub trait TlsProvider: Send + Sync {
    /// Returns the TLS client configuration.
    fn client_config(&self) -> Arc<rustls::ClientConfig>;

    /// Creates a TLS connector from this provider's configuration.
    fn connector(&self) -> TlsConnector {
        TlsConnector::from(self.client_config())
    }
}

/// Default TLS provider using rustls with Mozilla's root certificates.
pub struct RustlsTlsProvider {
    config: Arc<rustls::ClientConfig>,
}

impl RustlsTlsProvider {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            config: create_tls_config()?,
        })
    }
}

impl TlsProvider for RustlsTlsProvider {
    fn client_config(&self) -> Arc<rustls::ClientConfig> {
        self.config.clone()
    }
}

/// Creates a TLS client configuration with Mozilla's root certificates.
///
/// This configuration:
/// - Uses the ring crypto provider explicitly, so no process-wide default is needed
/// - Uses webpki-roots for trusted root certificates
/// - Does not use client authentication
/// - Supports TLS 1.2 and TLS 1.3
/// - Offers `h2` and `http/1.1` via ALPN
pub fn create_tls_config() -> Result<Arc<rustls::ClientConfig>, AppError> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| AppError::Tls(format!("unsupported protocol versions: {}", e)))?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    config.alpn_protocols = vec![ALPN_H2.to_vec(), ALPN_HTTP11.to_vec()];

    Ok(Arc::new(config))
}

/// Establishes a TLS connection over an existing TCP stream.
///
/// # Arguments
///
/// * `provider` - The TLS provider to use for configuration
/// * `tcp_stream` - The established TCP connection
/// * `server_name` - The server name for SNI
///
/// # Returns
///
/// A `Result` containing the TLS stream on success, or an error on failure.
pub async fn connect_tls<P: TlsProvider>(
    provider: &P,
    tcp_stream: TcpStream,
    server_name: &str,
) -> Result<TlsStream<TcpStream>, AppError> {
    let connector = provider.connector();

    let server_name = ServerName::try_from(server_name.to_string())
        .map_err(|e| AppError::Tls(format!("invalid server name: {}", e)))?;

    connector
        .connect(server_name, tcp_stream)
        .await
        .map_err(|e| AppError::Tls(format!("handshake failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_offers_h2_first() {
        let config = create_tls_config().unwrap();
        assert_eq!(config.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
    }

    #[test]
    fn test_provider_shares_config() {
        let provider = RustlsTlsProvider::new().unwrap();
        assert!(Arc::ptr_eq(&provider.client_config(), &provider.client_config()));
    }
}
