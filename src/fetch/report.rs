//! Human-readable report of a timed fetch.

use crate::shared::{remaining_days_label, unix_now, Color, DnsInfo, Palette, Timings, TlsSnapshot};
use hyper::StatusCode;

const INDENT: &str = "\t";

/// Statuses whose `Location` header is shown as a redirect.
const REDIRECT_STATUSES: [u16; 4] = [301, 302, 303, 307];

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Everything captured about one request.
#[derive(Debug, Clone)]
pub struct Report {
    pub dns: DnsInfo,
    pub timings: Timings,
    pub status: StatusCode,
    /// Reason phrase sent by the server when it differs from the standard one.
    pub reason: Option<String>,
    /// Raw `Location` header, whatever the status.
    pub location: Option<String>,
    pub bytes: u64,
    pub compressed: bool,
    pub transfer_encoding: Vec<String>,
    /// Header names in canonical form, in the order they were received.
    pub headers: Vec<(String, Vec<String>)>,
    pub tls: Option<TlsSnapshot>,
}

impl Report {
    /// Redirect target, only for the statuses that carry one.
    pub fn redirect(&self) -> Option<&str> {
        if !REDIRECT_STATUSES.contains(&self.status.as_u16()) {
            return None;
        }
        self.location.as_deref().filter(|l| !l.is_empty())
    }

    /// `"<code> <reason>"`, e.g. `"404 Not Found"`.
    ///
    /// The server's own phrase wins over the standard one.
    pub fn status_line(&self) -> String {
        let reason = self
            .reason
            .as_deref()
            .filter(|r| !r.is_empty())
            .or_else(|| self.status.canonical_reason());
        match reason {
            Some(reason) => format!("{} {}", self.status.as_u16(), reason),
            None => self.status.as_u16().to_string(),
        }
    }

    /// Renders the report with certificate expiry measured against the wall clock.
    pub fn render(&self, palette: &Palette) -> String {
        self.render_at(palette, unix_now())
    }

    /// Renders the report with certificate expiry measured against `now`.
    pub fn render_at(&self, palette: &Palette, now: i64) -> String {
        let mut out = String::from("\n");

        out.push_str("DNS\n");
        push_label_value(&mut out, "Resolved IPs", "");
        for ip in &self.dns.addrs {
            push_label_value(&mut out, "", &ip.to_string());
        }
        out.push('\n');

        out.push_str("Timings\n");
        push_label_value(&mut out, "DNS", &format!("{:?}", self.timings.dns));
        push_label_value(&mut out, "Connect", &format!("{:?}", self.timings.connect));
        push_label_value(&mut out, "TLS", &format!("{:?}", self.timings.tls));
        push_label_value(&mut out, "TTFB", &format!("{:?}", self.timings.ttfb));
        push_label_value(&mut out, "Total", &format!("{:?}", self.timings.total));
        out.push('\n');

        out.push_str("Transfer\n");
        let status_color = status_color(self.status.as_u16());
        push_label_value(&mut out, "Status", &palette.colorize(&self.status_line(), status_color));
        if let Some(location) = self.redirect() {
            push_label_value(&mut out, "Redirect", &palette.colorize(location, Color::Green));
        }
        push_label_value(&mut out, "Bytes", &transfer_size(self.bytes));
        push_label_value(&mut out, "Compressed", &self.compressed.to_string());
        if !self.transfer_encoding.is_empty() {
            push_label_value(&mut out, "Encoding", &self.transfer_encoding.join(", "));
        }
        out.push('\n');

        self.render_headers(&mut out);

        if let Some(tls) = &self.tls {
            render_certificates(&mut out, tls, palette, now);
        }

        out.push_str("Done\n");
        out
    }

    fn render_headers(&self, out: &mut String) {
        let width = self.headers.iter().map(|(name, _)| name.len()).max().unwrap_or(0);

        out.push_str("Headers\n");
        for (name, values) in &self.headers {
            if let [value] = values.as_slice() {
                out.push_str(&format!("{}{:<width$}: {}\n", INDENT, name, value, width = width));
                continue;
            }
            out.push_str(&format!("{}{}\n", INDENT, name));
            for (i, value) in values.iter().enumerate() {
                let branch = if i + 1 < values.len() { "├──" } else { "└──" };
                out.push_str(&format!("{} {} {}\n", INDENT, branch, value));
            }
        }
        out.push('\n');
    }
}

fn render_certificates(out: &mut String, tls: &TlsSnapshot, palette: &Palette, now: i64) {
    out.push_str("Certificates\n");
    push_label_value(out, "ServerName", &tls.server_name);
    push_label_value(out, "Protocol", &tls.negotiated_protocol);
    out.push('\n');

    for cert in &tls.peer_certificates {
        push_label_value(out, "Issuer", &cert.issuer);
        push_label_value(out, "IsCA", &cert.is_ca.to_string());
        if !cert.is_ca {
            if let Some((first, rest)) = cert.dns_names.split_first() {
                push_label_value(out, "DNSNames", first);
                for name in rest {
                    push_label_value(out, "", name);
                }
            }
        }
        push_label_value(out, "Algorithm", &cert.signature_algorithm);
        push_label_value(out, "NotBefore", &cert.not_before.to_string());
        let remaining = remaining_days_label(cert.not_after.timestamp(), now, palette);
        push_label_value(out, "NotAfter", &format!("{} [ {} ]", cert.not_after, remaining));
        out.push('\n');
    }
}

fn push_label_value(out: &mut String, label: &str, value: &str) {
    out.push_str(&format!("{}{:<10}: {}\n", INDENT, label, value));
}

fn status_color(code: u16) -> Color {
    match code {
        c if c >= 400 => Color::Red,
        c if c >= 300 => Color::Yellow,
        c if c >= 200 => Color::Green,
        c if c >= 100 => Color::Purple,
        _ => Color::White,
    }
}

/// Formats a byte count with a binary unit: `"512 B"`, `"1.50 KB"`.
pub fn transfer_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

/// `content-type` -> `Content-Type`.
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
