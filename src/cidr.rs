//! CIDR network ranges for trusted forwarder matching.
//!
//! Only the `address/prefix-length` form is accepted. A bare address such as
//! `10.0.0.1` is not a network and does not parse; register it as
//! `10.0.0.1/32` instead.
//!
//! Host bits in the network address are ignored, so `10.1.2.3/8` describes
//! the same range as `10.0.0.0/8`.

use std::fmt;
use std::net::IpAddr;

/// Parsed CIDR network range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrRange {
    /// Network address as written
    network: IpAddr,
    /// Prefix length (e.g., 24 for /24)
    prefix_len: u8,
}

impl CidrRange {
    /// Parse a CIDR notation string (e.g., "10.0.0.0/8" or "2400:cb00::/32").
    ///
    /// Returns `None` if the format is invalid or the prefix length exceeds
    /// the address width.
    pub fn parse(cidr: &str) -> Option<Self> {
        let (addr, len) = cidr.trim().split_once('/')?;

        let network: IpAddr = addr.parse().ok()?;
        // Reject signs and whitespace that u8::from_str would otherwise accept
        if len.is_empty() || !len.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let prefix_len: u8 = len.parse().ok()?;

        if prefix_len > max_prefix(&network) {
            return None;
        }

        Some(Self {
            network,
            prefix_len,
        })
    }

    /// Network address as written (host bits are not cleared).
    pub fn network(&self) -> IpAddr {
        self.network
    }

    /// Prefix length in bits.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Check if an IP address is contained within this CIDR range.
    ///
    /// IPv4-mapped IPv6 addresses are matched against IPv4 ranges.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (&self.network, ip.to_canonical()) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = u32::MAX
                    .checked_shl(32 - u32::from(self.prefix_len))
                    .unwrap_or(0);
                (u32::from(*net) & mask) == (u32::from(addr) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = u128::MAX
                    .checked_shl(128 - u32::from(self.prefix_len))
                    .unwrap_or(0);
                (u128::from(*net) & mask) == (u128::from(addr) & mask)
            }
            _ => false,
        }
    }
}

impl fmt::Display for CidrRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

fn max_prefix(ip: &IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}
