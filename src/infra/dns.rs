//! DNS resolution infrastructure.
//!
//! Provides a trait-based abstraction for DNS resolution, allowing for
//! dependency injection and easier testing.

use hickory_resolver::{config::*, TokioAsyncResolver};
use std::net::IpAddr;

/// Trait for DNS resolution.
///
/// This abstraction allows for different DNS resolver implementations
/// and makes testing easier by allowing mock implementations.
#[allow(async_fn_in_trait)]
pub trait DnsResolver: Send + Sync {
    /// Resolves a hostname to a list of IP addresses.
    ///
    /// # Arguments
    ///
    /// * `host` - The hostname to resolve, IPv6 literals without brackets
    ///
    /// # Returns
    ///
    /// The resolved addresses in resolver order, or an error message.
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, String>;
}

/// DNS resolver implementation using hickory-resolver (formerly trust-dns).
pub struct HickoryDnsResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryDnsResolver {
    /// Creates a resolver from the system configuration, falling back to
    /// hickory's default upstreams when it cannot be read.
    pub fn new() -> Self {
        let resolver = match TokioAsyncResolver::tokio_from_system_conf() {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("System resolver config unavailable ({}), using defaults", e);
                TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
            }
        };
        Self { resolver }
    }
}

impl Default for HickoryDnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsResolver for HickoryDnsResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, String> {
        // Check if already an IP address
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        match self.resolver.lookup_ip(host).await {
            Ok(response) => {
                let ips: Vec<IpAddr> = response.iter().collect();
                if ips.is_empty() {
                    Err(format!("lookup {}: no addresses", host))
                } else {
                    Ok(ips)
                }
            }
            Err(e) => Err(format!("lookup {}: {}", host, e)),
        }
    }
}
