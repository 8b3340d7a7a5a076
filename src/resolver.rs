//! Client address resolution across trusted proxy hops.
//!
//! # Algorithm
//!
//! 1. If the connecting peer is not a trusted forwarder, it is the client.
//!    Forwarding headers from an untrusted peer are attacker-controlled and
//!    are never read.
//! 2. Otherwise headers are read in registry priority order. Each value is a
//!    comma-separated chain, oldest hop first. Tokens are scanned from the
//!    right; tokens that are not IP addresses are skipped.
//! 3. The first parsed token that is not itself trusted is the client and
//!    ends the walk across all headers. Trusted tokens are remembered and the
//!    scan moves further left, then on to the next header.
//! 4. If nothing untrusted turns up, the last address seen is returned
//!    (the peer itself when no token parsed at all).
//!
//! ```text
//! peer 10.0.0.5 (trusted)
//! X-Forwarded-For: 31.69.99.22, 85.100.50.25, 103.21.244.10
//!                                    ▲              ▲
//!                       first untrusted ◄── trusted CDN hop, skipped
//! ```
//!
//! Resolution is synchronous and never fails once a peer address is known.

use std::borrow::Cow;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::net::{IpAddr, SocketAddr};

use axum::http::{HeaderMap, Request, request};
use tracing::{debug, trace};

use crate::error::ResolveError;
use crate::registry::TrustRegistry;

/// Where a resolved client address came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// The connecting peer itself.
    Peer,
    /// The first untrusted address found in the named header.
    Header(String),
    /// Every candidate was a trusted hop; the last one seen came from the
    /// named header.
    TrustedHop(String),
}

impl Source {
    /// Short label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Source::Peer => "peer",
            Source::Header(_) => "header",
            Source::TrustedHop(_) => "trusted_hop",
        }
    }

    /// Header the address was read from, if any.
    pub fn header(&self) -> Option<&str> {
        match self {
            Source::Peer => None,
            Source::Header(name) | Source::TrustedHop(name) => Some(name),
        }
    }
}

/// Best-effort real client address of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp {
    pub addr: IpAddr,
    pub source: Source,
}

impl ClientIp {
    fn peer(addr: IpAddr) -> Self {
        Self {
            addr,
            source: Source::Peer,
        }
    }
}

/// Case-insensitive access to request header values.
///
/// Returns the raw value, which may be a comma-separated list. `None` means
/// the header is absent.
pub trait HeaderLookup {
    fn header(&self, name: &str) -> Option<Cow<'_, str>>;
}

/// Multiple field lines with the same name are joined with `,` in arrival
/// order, which is equivalent to a single comma-separated line. Values that
/// are not visible ASCII are ignored.
impl HeaderLookup for HeaderMap {
    fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        let mut values = self.get_all(name).iter().filter_map(|v| v.to_str().ok());
        let first = values.next()?;
        match values.next() {
            None => Some(Cow::Borrowed(first)),
            Some(second) => {
                let mut joined = format!("{first},{second}");
                for value in values {
                    joined.push(',');
                    joined.push_str(value);
                }
                Some(Cow::Owned(joined))
            }
        }
    }
}

impl<B> HeaderLookup for Request<B> {
    fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.headers().header(name)
    }
}

impl HeaderLookup for request::Parts {
    fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.headers.header(name)
    }
}

impl<S: BuildHasher> HeaderLookup for HashMap<String, String, S> {
    fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| Cow::Borrowed(value.as_str()))
    }
}

impl HeaderLookup for [(&str, &str)] {
    fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| Cow::Borrowed(*value))
    }
}

impl<const N: usize> HeaderLookup for [(&str, &str); N] {
    fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.as_slice().header(name)
    }
}

impl<T: HeaderLookup + ?Sized> HeaderLookup for &T {
    fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        (**self).header(name)
    }
}

/// Split `host:port` into host and port.
///
/// IPv6 hosts must be bracketed (`[::1]:443`). The brackets are removed from
/// the returned host. An empty port (`host:`) is accepted; a missing one is
/// not.
pub fn split_host_port(addr: &str) -> Result<(&str, &str), ResolveError> {
    const MISSING_PORT: &str = "missing port in address";
    const TOO_MANY_COLONS: &str = "too many colons in address";

    let colon = addr
        .rfind(':')
        .ok_or_else(|| ResolveError::malformed(addr, MISSING_PORT))?;

    let (host, open_from, close_from) = if let Some(rest) = addr.strip_prefix('[') {
        let end = rest
            .find(']')
            .map(|i| i + 1)
            .ok_or_else(|| ResolveError::malformed(addr, "missing ']' in address"))?;
        let after = end + 1;
        if after != colon {
            let reason = match addr.as_bytes().get(after) {
                None => MISSING_PORT,
                Some(b':') => TOO_MANY_COLONS,
                Some(_) => MISSING_PORT,
            };
            return Err(ResolveError::malformed(addr, reason));
        }
        let host = addr
            .get(1..end)
            .ok_or_else(|| ResolveError::malformed(addr, MISSING_PORT))?;
        (host, 1, after)
    } else {
        let host = addr.get(..colon).unwrap_or_default();
        if host.contains(':') {
            return Err(ResolveError::malformed(addr, TOO_MANY_COLONS));
        }
        (host, 0, 0)
    };

    if addr.get(open_from..).is_some_and(|s| s.contains('[')) {
        return Err(ResolveError::malformed(addr, "unexpected '[' in address"));
    }
    if addr.get(close_from..).is_some_and(|s| s.contains(']')) {
        return Err(ResolveError::malformed(addr, "unexpected ']' in address"));
    }

    let port = addr.get(colon + 1..).unwrap_or_default();
    Ok((host, port))
}

impl TrustRegistry {
    /// Resolve the client address for a `host:port` peer address.
    ///
    /// The peer host is returned verbatim when it is the answer; addresses
    /// taken from headers are returned in canonical form. A peer host that
    /// is not an IP address (e.g. a Unix socket name) is never trusted and
    /// comes back unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MalformedPeerAddr`] if `peer_addr` cannot be
    /// split into host and port.
    pub fn resolve<H>(&self, peer_addr: &str, headers: &H) -> Result<String, ResolveError>
    where
        H: HeaderLookup + ?Sized,
    {
        let (host, _port) = split_host_port(peer_addr)?;

        let Ok(peer) = host.parse::<IpAddr>() else {
            debug!(peer = %host, "Peer host is not an IP address, using it as-is");
            return Ok(host.to_string());
        };

        let client = self.resolve_ip(peer, headers);
        Ok(match client.source {
            Source::Peer => host.to_string(),
            Source::Header(_) | Source::TrustedHop(_) => client.addr.to_string(),
        })
    }

    /// Resolve the client address for a connected socket. The port is ignored.
    pub fn resolve_socket<H>(&self, peer: SocketAddr, headers: &H) -> ClientIp
    where
        H: HeaderLookup + ?Sized,
    {
        self.resolve_ip(peer.ip(), headers)
    }

    /// Resolve the client address for a peer IP.
    ///
    /// IPv4-mapped peers (as reported by dual-stack listeners) are returned in
    /// IPv4 form, the same as header-derived addresses.
    pub fn resolve_ip<H>(&self, peer: IpAddr, headers: &H) -> ClientIp
    where
        H: HeaderLookup + ?Sized,
    {
        let peer = peer.to_canonical();

        if !self.is_trusted(&peer) {
            debug!(peer = %peer, "Peer is not a trusted forwarder, ignoring forwarding headers");
            return ClientIp::peer(peer);
        }

        let mut current = ClientIp::peer(peer);

        for name in self.headers() {
            let Some(value) = headers.header(name) else {
                continue;
            };

            for token in value.rsplit(',') {
                let token = token.trim();
                let Ok(addr) = token.parse::<IpAddr>() else {
                    if !token.is_empty() {
                        trace!(header = %name, token = %token, "Skipping unparseable forwarding token");
                    }
                    continue;
                };
                let addr = addr.to_canonical();

                if !self.is_trusted(&addr) {
                    debug!(peer = %peer, client_ip = %addr, header = %name, "Resolved client IP from forwarding header");
                    return ClientIp {
                        addr,
                        source: Source::Header(name.clone()),
                    };
                }

                current = ClientIp {
                    addr,
                    source: Source::TrustedHop(name.clone()),
                };
            }
        }

        debug!(
            peer = %peer,
            client_ip = %current.addr,
            source = current.source.label(),
            "No untrusted address in forwarding headers, using last trusted address"
        );
        current
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn registry() -> TrustRegistry {
        TrustRegistry::default().with_forwarders(["127.0.0.0/8", "::1/128"])
    }

    // ==========================================================================
    // split_host_port
    // ==========================================================================

    #[test]
    fn test_split_ipv4() {
        assert_eq!(split_host_port("127.0.0.1:8080").unwrap(), ("127.0.0.1", "8080"));
    }

    #[test]
    fn test_split_bracketed_ipv6() {
        assert_eq!(split_host_port("[::1]:443").unwrap(), ("::1", "443"));
        assert_eq!(
            split_host_port("[2001:db8::1%eth0]:80").unwrap(),
            ("2001:db8::1%eth0", "80")
        );
    }

    #[test]
    fn test_split_hostname_and_empty_port() {
        assert_eq!(split_host_port("localhost:").unwrap(), ("localhost", ""));
        assert_eq!(split_host_port(":80").unwrap(), ("", "80"));
    }

    #[test]
    fn test_split_errors() {
        let reason = |addr: &str| match split_host_port(addr).unwrap_err() {
            ResolveError::MalformedPeerAddr { reason, .. } => reason,
        };

        assert_eq!(reason("127.0.0.1"), "missing port in address");
        assert_eq!(reason(""), "missing port in address");
        assert_eq!(reason("::1"), "too many colons in address");
        assert_eq!(reason("2001:db8::1:80"), "too many colons in address");
        assert_eq!(reason("[::1]"), "missing port in address");
        assert_eq!(reason("[::1]x:80"), "missing port in address");
        assert_eq!(reason("[::1]:80:90"), "too many colons in address");
        assert_eq!(reason("[::1:80"), "missing ']' in address");
        assert_eq!(reason("[[::1]:80"), "unexpected '[' in address");
        assert_eq!(reason("a]b:80"), "unexpected ']' in address");
    }

    // ==========================================================================
    // HeaderLookup
    // ==========================================================================

    #[test]
    fn test_header_map_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "1.2.3.4".parse().unwrap());

        assert_eq!(headers.header("X-Forwarded-For").as_deref(), Some("1.2.3.4"));
        assert!(headers.header("X-Real-Ip").is_none());
    }

    #[test]
    fn test_header_map_joins_repeated_lines() {
        let mut headers = HeaderMap::new();
        headers.append("x-forwarded-for", "1.1.1.1".parse().unwrap());
        headers.append("x-forwarded-for", "2.2.2.2, 3.3.3.3".parse().unwrap());
        headers.append("x-forwarded-for", "4.4.4.4".parse().unwrap());

        assert_eq!(
            headers.header("x-forwarded-for").as_deref(),
            Some("1.1.1.1,2.2.2.2, 3.3.3.3,4.4.4.4")
        );
    }

    #[test]
    fn test_header_map_skips_opaque_values() {
        let mut headers = HeaderMap::new();
        headers.append(
            "x-real-ip",
            axum::http::HeaderValue::from_bytes(b"\xff\xfe").unwrap(),
        );
        assert!(headers.header("x-real-ip").is_none());
    }

    #[test]
    fn test_header_map_invalid_name_is_absent() {
        let headers = HeaderMap::new();
        assert!(headers.header("not a header").is_none());
    }

    #[test]
    fn test_hash_map_and_pairs_lookup() {
        let map: HashMap<String, String> =
            HashMap::from([("cf-connecting-ip".to_string(), "9.9.9.9".to_string())]);
        assert_eq!(map.header("CF-Connecting-IP").as_deref(), Some("9.9.9.9"));

        let pairs = [("X-Real-IP", "8.8.4.4")];
        assert_eq!(pairs.header("x-real-ip").as_deref(), Some("8.8.4.4"));
    }

    // ==========================================================================
    // Resolution
    // ==========================================================================

    #[test]
    fn test_untrusted_peer_ignores_headers() {
        let client = registry().resolve_ip(
            "31.69.99.22".parse().unwrap(),
            &[("X-Forwarded-For", "1.2.3.4")],
        );
        assert_eq!(client, ClientIp::peer("31.69.99.22".parse().unwrap()));
    }

    #[test]
    fn test_trusted_peer_without_headers_returns_peer() {
        let client = registry().resolve_ip("10.0.0.1".parse().unwrap(), &HeaderMap::new());
        assert_eq!(client.source, Source::Peer);
        assert_eq!(client.addr.to_string(), "10.0.0.1");
    }

    #[test]
    fn test_rightmost_untrusted_wins() {
        let client = registry().resolve_ip(
            "127.0.0.1".parse().unwrap(),
            &[("X-Forwarded-For", "31.69.99.22, 85.100.50.25")],
        );
        assert_eq!(client.addr.to_string(), "85.100.50.25");
        assert_eq!(client.source, Source::Header("X-Forwarded-For".to_string()));
    }

    #[test]
    fn test_all_trusted_chain_returns_leftmost_trusted() {
        let client = registry().resolve_ip(
            "127.0.0.1".parse().unwrap(),
            &[("X-Forwarded-For", "192.168.1.10, 10.0.0.2")],
        );
        assert_eq!(client.addr.to_string(), "192.168.1.10");
        assert_eq!(
            client.source,
            Source::TrustedHop("X-Forwarded-For".to_string())
        );
    }

    #[test]
    fn test_trusted_hop_carries_into_next_header() {
        let client = registry().resolve_ip(
            "127.0.0.1".parse().unwrap(),
            &[("X-Forwarded-For", "10.0.0.2"), ("CF-Connecting-IP", "85.100.50.25")],
        );
        assert_eq!(client.addr.to_string(), "85.100.50.25");
        assert_eq!(
            client.source,
            Source::Header("CF-Connecting-IP".to_string())
        );
    }

    #[test]
    fn test_garbage_tokens_are_skipped() {
        let client = registry().resolve_ip(
            "127.0.0.1".parse().unwrap(),
            &[("X-Forwarded-For", "85.100.50.25, unknown, , 1.2.3.4:80")],
        );
        assert_eq!(client.addr.to_string(), "85.100.50.25");
    }

    #[test]
    fn test_only_garbage_keeps_peer() {
        let client = registry().resolve_ip(
            "127.0.0.1".parse().unwrap(),
            &[("X-Forwarded-For", "unknown"), ("X-Real-Ip", "")],
        );
        assert_eq!(client, ClientIp::peer("127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_ipv4_mapped_token_is_canonicalized() {
        let client = registry().resolve_ip(
            "127.0.0.1".parse().unwrap(),
            &[("X-Forwarded-For", "::ffff:85.100.50.25")],
        );
        assert_eq!(client.addr.to_string(), "85.100.50.25");
    }

    #[test]
    fn test_ipv4_mapped_peer_is_canonicalized() {
        let direct = registry().resolve_socket(
            "[::ffff:31.69.99.22]:4000".parse().unwrap(),
            &[("X-Forwarded-For", "1.2.3.4")],
        );
        assert_eq!(direct, ClientIp::peer("31.69.99.22".parse().unwrap()));

        let proxied = registry().resolve_socket(
            "[::ffff:10.0.0.1]:4000".parse().unwrap(),
            &[("X-Forwarded-For", "::ffff:31.69.99.22")],
        );
        assert_eq!(proxied.addr, direct.addr);

        let no_headers = registry().resolve_socket(
            "[::ffff:10.0.0.1]:4000".parse().unwrap(),
            &HeaderMap::new(),
        );
        assert_eq!(no_headers, ClientIp::peer("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_resolve_returns_peer_host_verbatim() {
        let headers: [(&str, &str); 0] = [];
        assert_eq!(
            registry().resolve("[::1]:5000", &headers).unwrap(),
            "::1"
        );
        assert_eq!(
            registry().resolve("203.0.113.7:5000", &headers).unwrap(),
            "203.0.113.7"
        );
    }

    #[test]
    fn test_resolve_non_ip_peer_host() {
        let result = registry()
            .resolve("localhost:80", &[("X-Forwarded-For", "1.2.3.4")])
            .unwrap();
        assert_eq!(result, "localhost");
    }

    #[test]
    fn test_resolve_malformed_peer_is_error() {
        let result = registry().resolve("127.0.0.1", &[("X-Forwarded-For", "1.2.3.4")]);
        assert!(matches!(
            result,
            Err(ResolveError::MalformedPeerAddr { .. })
        ));
    }

    #[test]
    fn test_resolve_from_request() {
        let req = Request::builder()
            .header("x-real-ip", "198.51.100.23")
            .body(Body::empty())
            .unwrap();

        let client = registry().resolve_socket("10.1.1.1:4000".parse().unwrap(), &req);
        assert_eq!(client.addr.to_string(), "198.51.100.23");
        assert_eq!(client.source.header(), Some("X-Real-Ip"));
        assert_eq!(client.source.label(), "header");
    }
}
