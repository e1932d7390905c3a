//! Request lifecycle tracing.
//!
//! A transport borrows a [`RequestTrace`] for the duration of one round trip
//! and calls its hook methods as each phase completes:
//! DNS -> connect -> TLS -> first response byte.

use super::cert_parser::PeerCertificate;
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// Outcome of name resolution as seen by the DNS-done hook.
#[derive(Debug, Clone, Default)]
pub struct DnsInfo {
    pub addrs: Vec<IpAddr>,
    pub error: Option<String>,
}

/// State of the TLS session after the handshake.
#[derive(Debug, Clone)]
pub struct TlsSnapshot {
    /// Negotiated ALPN protocol, empty when none was agreed.
    pub negotiated_protocol: String,
    pub server_name: String,
    pub peer_certificates: Vec<PeerCertificate>,
}

/// Timestamps and state captured while a request is in flight.
///
/// Every field is written at most once; later calls to the same hook are
/// ignored.
#[derive(Debug, Default)]
pub struct RequestTrace {
    dns_start: Option<Instant>,
    dns: Option<Duration>,
    dns_info: Option<DnsInfo>,
    connect_start: Option<Instant>,
    connect: Option<Duration>,
    tls_start: Option<Instant>,
    tls: Option<Duration>,
    tls_snapshot: Option<TlsSnapshot>,
    ttfb: Option<Duration>,
}

/// Phase durations derived from a finished trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timings {
    pub dns: Duration,
    pub connect: Duration,
    pub tls: Duration,
    pub ttfb: Duration,
    pub total: Duration,
}

fn since(start: Option<Instant>) -> Option<Duration> {
    start.map(|s| s.elapsed())
}

impl RequestTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dns_start(&mut self) {
        self.dns_start.get_or_insert_with(Instant::now);
    }

    pub fn dns_done(&mut self, info: DnsInfo) {
        if self.dns_info.is_none() {
            self.dns = since(self.dns_start);
            self.dns_info = Some(info);
        }
    }

    pub fn connect_start(&mut self) {
        self.connect_start.get_or_insert_with(Instant::now);
    }

    pub fn connect_done(&mut self) {
        if self.connect.is_none() {
            self.connect = since(self.connect_start);
        }
    }

    pub fn tls_handshake_start(&mut self) {
        self.tls_start.get_or_insert_with(Instant::now);
    }

    pub fn tls_handshake_done(&mut self, snapshot: TlsSnapshot) {
        if self.tls_snapshot.is_none() {
            self.tls = since(self.tls_start);
            self.tls_snapshot = Some(snapshot);
        }
    }

    /// Marks the first response byte.
    ///
    /// Measured from connect start, so the figure excludes name resolution.
    pub fn got_first_response_byte(&mut self) {
        if self.ttfb.is_none() {
            self.ttfb = since(self.connect_start);
        }
    }

    pub fn dns_info(&self) -> Option<&DnsInfo> {
        self.dns_info.as_ref()
    }

    pub fn dns_error(&self) -> Option<&str> {
        self.dns_info.as_ref().and_then(|info| info.error.as_deref())
    }

    pub fn tls_snapshot(&self) -> Option<&TlsSnapshot> {
        self.tls_snapshot.as_ref()
    }

    /// Splits the trace into its phase durations and captured state.
    pub fn finish(self, total: Duration) -> (Timings, Option<DnsInfo>, Option<TlsSnapshot>) {
        let timings = Timings {
            dns: self.dns.unwrap_or_default(),
            connect: self.connect.unwrap_or_default(),
            tls: self.tls.unwrap_or_default(),
            ttfb: self.ttfb.unwrap_or_default(),
            total,
        };
        (timings, self.dns_info, self.tls_snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn snapshot() -> TlsSnapshot {
        TlsSnapshot {
            negotiated_protocol: "h2".to_string(),
            server_name: "example.com".to_string(),
            peer_certificates: Vec::new(),
        }
    }

    #[test]
    fn test_new_trace() {
        let trace = RequestTrace::new();
        assert!(trace.dns_info().is_none());
        assert!(trace.tls_snapshot().is_none());
        let (timings, dns, tls) = trace.finish(Duration::ZERO);
        assert_eq!(timings, Timings::default());
        assert!(dns.is_none());
        assert!(tls.is_none());
    }

    #[test]
    fn test_trace_phases() {
        let mut trace = RequestTrace::new();

        trace.dns_start();
        sleep(Duration::from_millis(1));
        trace.dns_done(DnsInfo {
            addrs: vec!["127.0.0.1".parse().unwrap()],
            error: None,
        });

        trace.connect_start();
        sleep(Duration::from_millis(1));
        trace.connect_done();

        trace.tls_handshake_start();
        sleep(Duration::from_millis(1));
        trace.tls_handshake_done(snapshot());

        sleep(Duration::from_millis(1));
        trace.got_first_response_byte();

        assert!(trace.dns_error().is_none());
        let (timings, dns, tls) = trace.finish(Duration::from_millis(10));
        assert!(timings.dns >= Duration::from_millis(1));
        assert!(timings.connect >= Duration::from_millis(1));
        assert!(timings.tls >= Duration::from_millis(1));
        // TTFB starts at connect, so it spans connect, TLS and the wait
        assert!(timings.ttfb >= timings.connect + timings.tls);
        assert_eq!(timings.total, Duration::from_millis(10));
        assert_eq!(dns.unwrap().addrs.len(), 1);
        assert_eq!(tls.unwrap().negotiated_protocol, "h2");
    }

    #[test]
    fn test_hooks_write_once() {
        let mut trace = RequestTrace::new();
        trace.dns_start();
        trace.dns_done(DnsInfo {
            addrs: Vec::new(),
            error: Some("lookup failed".to_string()),
        });
        trace.dns_done(DnsInfo::default());
        assert_eq!(trace.dns_error(), Some("lookup failed"));
    }

    #[test]
    fn test_ttfb_without_connect() {
        let mut trace = RequestTrace::new();
        trace.got_first_response_byte();
        let (timings, _, _) = trace.finish(Duration::ZERO);
        assert_eq!(timings.ttfb, Duration::ZERO);
    }
}
