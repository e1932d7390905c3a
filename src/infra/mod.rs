//! Infrastructure layer providing abstractions for external dependencies.
//!
//! This module contains traits and implementations for:
//! - DNS resolution
//! - TLS/SSL connections
//! - Content decompression

pub mod decompressor;
pub mod dns;
pub mod tls;

pub use decompressor::{decompress_body, is_supported_encoding, Decompressor, MultiDecompressor};
pub use dns::{DnsResolver, HickoryDnsResolver};
pub use tls::{connect_tls, create_tls_config, RustlsTlsProvider, TlsProvider};
