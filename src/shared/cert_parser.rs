//! X.509 certificate parsing utilities.
//!
//! Provides functionality for extracting information from TLS certificates.

use super::timing::TlsSnapshot;
use tokio::net::TcpStream;
use x509_parser::objects::{oid2sn, oid_registry};
use x509_parser::prelude::*;

/// Certificate fields shown in the report.
#[derive(Debug, Clone)]
pub struct PeerCertificate {
    pub issuer: String,
    pub is_ca: bool,
    pub dns_names: Vec<String>,
    pub signature_algorithm: String,
    pub not_before: ASN1Time,
    pub not_after: ASN1Time,
}

/// Parses the reported fields from DER-encoded X.509 data.
///
/// # Arguments
///
/// * `der` - The DER-encoded certificate data
///
/// # Returns
///
/// `None` when the data is not a certificate x509-parser understands.
pub fn parse_peer_certificate(der: &[u8]) -> Option<PeerCertificate> {
    let (_, cert) = X509Certificate::from_der(der).ok()?;

    let is_ca = matches!(cert.basic_constraints(), Ok(Some(ext)) if ext.value.ca);

    let mut dns_names = Vec::new();
    if let Ok(Some(san_ext)) = cert.subject_alternative_name() {
        for name in &san_ext.value.general_names {
            if let GeneralName::DNSName(dns) = name {
                dns_names.push(dns.to_string());
            }
        }
    }

    let algorithm = &cert.signature_algorithm.algorithm;
    let signature_algorithm = oid2sn(algorithm, oid_registry())
        .map(|sn| sn.to_string())
        .unwrap_or_else(|_| algorithm.to_id_string());

    Some(PeerCertificate {
        issuer: cert.issuer().to_string(),
        is_ca,
        dns_names,
        signature_algorithm,
        not_before: cert.validity().not_before,
        not_after: cert.validity().not_after,
    })
}

/// Captures the session state of an established TLS connection.
///
/// Certificates that fail to parse are skipped with a warning.
pub fn snapshot_from_stream(
    conn: &tokio_rustls::client::TlsStream<TcpStream>,
    server_name: &str,
) -> TlsSnapshot {
    let (_, client_conn) = conn.get_ref();

    let negotiated_protocol = client_conn
        .alpn_protocol()
        .map(|p| String::from_utf8_lossy(p).into_owned())
        .unwrap_or_default();

    let peer_certificates = client_conn
        .peer_certificates()
        .unwrap_or_default()
        .iter()
        .filter_map(|der| {
            let parsed = parse_peer_certificate(der.as_ref());
            if parsed.is_none() {
                tracing::warn!("Skipping unparseable peer certificate");
            }
            parsed
        })
        .collect();

    TlsSnapshot {
        negotiated_protocol,
        server_name: server_name.to_string(),
        peer_certificates,
    }
}
