//! Trusted forwarder registry.
//!
//! A [`TrustRegistry`] holds the network prefixes whose peers are believed to
//! append honest client addresses to forwarding headers, and the ordered list
//! of headers to read those addresses from.
//!
//! # Defaults
//!
//! [`TrustRegistry::default`] trusts the RFC1918 private networks and the
//! published Cloudflare edge ranges, and reads `X-Forwarded-For`, then
//! `X-Real-Ip`, then `CF-Connecting-IP`.
//!
//! # Malformed Prefixes
//!
//! Appending never fails. A prefix that is not valid CIDR notation is kept in
//! the list (so [`TrustRegistry::prefixes`] shows exactly what was registered)
//! but never matches any address. Use [`crate::config::Config::validate`] when
//! registration errors should be fatal.
//!
//! # Sharing
//!
//! Build the registry during startup, then share it as `Arc<TrustRegistry>`.
//! The append methods take `&mut self`, so a shared registry cannot change
//! under concurrent readers; reconfiguring means building a new one.

use std::net::IpAddr;

use tracing::{debug, warn};

use crate::cidr::CidrRange;

/// RFC1918 IPv4 private address space.
pub const PRIVATE_PREFIXES: &[&str] = &["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"];

/// Cloudflare edge address space, see <https://www.cloudflare.com/ips/>.
pub const CLOUDFLARE_PREFIXES: &[&str] = &[
    "103.21.244.0/22",
    "103.22.200.0/22",
    "103.31.4.0/22",
    "104.16.0.0/13",
    "104.24.0.0/14",
    "108.162.192.0/18",
    "131.0.72.0/22",
    "141.101.64.0/18",
    "162.158.0.0/15",
    "172.64.0.0/13",
    "173.245.48.0/20",
    "188.114.96.0/20",
    "190.93.240.0/20",
    "197.234.240.0/22",
    "198.41.128.0/17",
    "2400:cb00::/32",
    "2606:4700::/32",
    "2803:f800::/32",
    "2405:b500::/32",
    "2405:8100::/32",
    "2a06:98c0::/29",
    "2c0f:f248::/32",
];

/// Forwarding headers consulted by default, highest priority first.
pub const DEFAULT_HEADERS: &[&str] = &["X-Forwarded-For", "X-Real-Ip", "CF-Connecting-IP"];

/// A registered prefix: the text as given plus its parsed range, if valid.
#[derive(Debug, Clone)]
struct Forwarder {
    prefix: String,
    range: Option<CidrRange>,
}

impl Forwarder {
    fn new(prefix: String) -> Self {
        let range = CidrRange::parse(&prefix);
        if range.is_none() {
            warn!(prefix = %prefix, "Invalid CIDR prefix registered as forwarder, it will never match");
        }
        Self { prefix, range }
    }
}

/// Trusted forwarder prefixes and the forwarding headers to honor.
#[derive(Debug, Clone)]
pub struct TrustRegistry {
    forwarders: Vec<Forwarder>,
    headers: Vec<String>,
}

impl TrustRegistry {
    /// A registry that trusts nothing and reads no headers.
    ///
    /// Resolution against an empty registry always yields the peer address.
    pub fn empty() -> Self {
        Self {
            forwarders: Vec::new(),
            headers: Vec::new(),
        }
    }

    /// Append trusted forwarder prefixes.
    ///
    /// Entries are not validated eagerly; malformed ones are logged and never
    /// match.
    pub fn add_forwarders<I, S>(&mut self, prefixes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.forwarders.len();
        self.forwarders
            .extend(prefixes.into_iter().map(|p| Forwarder::new(p.into())));
        debug!(
            added = self.forwarders.len() - before,
            total = self.forwarders.len(),
            "Forwarder prefixes appended"
        );
        self
    }

    /// Append forwarding header names, consulted after the existing ones.
    ///
    /// Names are not deduplicated; a repeated name is read again, which is
    /// redundant but harmless.
    pub fn add_headers<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers.extend(names.into_iter().map(Into::into));
        self
    }

    /// Consuming form of [`add_forwarders`](Self::add_forwarders).
    pub fn with_forwarders<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_forwarders(prefixes);
        self
    }

    /// Consuming form of [`add_headers`](Self::add_headers).
    pub fn with_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_headers(names);
        self
    }

    /// Registered prefixes in insertion order, including malformed ones.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.forwarders.iter().map(|f| f.prefix.as_str())
    }

    /// Header names in priority order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Check whether an address lies inside any valid registered prefix.
    pub fn is_trusted(&self, ip: &IpAddr) -> bool {
        self.forwarders
            .iter()
            .filter_map(|f| f.range.as_ref())
            .any(|range| range.contains(ip))
    }

    /// Parse `ip` and check it; text that is not an address is never trusted.
    pub fn is_trusted_str(&self, ip: &str) -> bool {
        ip.trim()
            .parse::<IpAddr>()
            .is_ok_and(|ip| self.is_trusted(&ip))
    }
}

impl Default for TrustRegistry {
    fn default() -> Self {
        Self::empty()
            .with_forwarders(PRIVATE_PREFIXES.iter().copied())
            .with_forwarders(CLOUDFLARE_PREFIXES.iter().copied())
            .with_headers(DEFAULT_HEADERS.iter().copied())
    }
}
