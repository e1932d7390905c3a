//! Shared utilities used by the fetch driver and the report renderer.
//!
//! Colors, certificate parsing and expiry, and request lifecycle tracing.

pub mod cert_parser;
pub mod colors;
pub mod expiry;
pub mod timing;

pub use cert_parser::{parse_peer_certificate, PeerCertificate};
pub use colors::{Color, Palette};
pub use expiry::{remaining_days, remaining_days_label, unix_now};
pub use timing::{DnsInfo, RequestTrace, Timings, TlsSnapshot};
