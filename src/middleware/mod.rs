//! HTTP middleware.
//!
//! - **Client IP**: resolves the real client address behind trusted proxies
//!   and exposes it as the [`ClientIp`](crate::ClientIp) extractor.

pub mod client_ip;

pub use client_ip::{ClientIpLayer, ClientIpService};
