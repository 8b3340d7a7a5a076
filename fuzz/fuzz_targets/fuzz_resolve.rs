//! Fuzz testing for client IP resolution.
//!
//! Peer addresses and forwarding headers are attacker-influenced, so neither
//! `split_host_port` nor the header chain walk may panic on any input.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_resolve
//! cargo +nightly fuzz run fuzz_resolve -- -max_total_time=60
//! ```
//!
//! # Input Layout
//!
//! The input is split on the first `\n`: the part before is the peer
//! address, the rest is used as every forwarding header's value.

#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use remoteaddr::{TrustRegistry, split_host_port};

fn registry() -> &'static TrustRegistry {
    static REGISTRY: OnceLock<TrustRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        TrustRegistry::default()
            .with_forwarders(["127.0.0.0/8", "::1/128", "not-a-cidr"])
            .with_headers(["True-Client-IP"])
    })
}

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let (peer, chain) = s.split_once('\n').unwrap_or((s, ""));

    let _ = split_host_port(peer);
    let _ = registry().is_trusted_str(peer);

    let headers = [
        ("X-Forwarded-For", chain),
        ("X-Real-Ip", chain),
        ("CF-Connecting-IP", chain),
        ("True-Client-IP", chain),
    ];

    if let Ok(resolved) = registry().resolve(peer, &headers) {
        // A header-derived answer is always a valid address
        if resolved != split_host_port(peer).map(|(host, _)| host).unwrap_or_default() {
            assert!(resolved.parse::<std::net::IpAddr>().is_ok());
        }
    }
});
