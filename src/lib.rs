//! # remoteaddr
//!
//! Resolve the real client IP of an HTTP request that may have passed
//! through trusted reverse proxies such as a CDN or load balancer.
//!
//! Forwarding headers like `X-Forwarded-For` are attacker-controlled when the
//! attacker connects directly, so they are only read when the connecting peer
//! is a trusted forwarder. Proxy chains are walked right-to-left, skipping
//! trusted hops, until the first untrusted address.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ClientIpLayer (ConnectInfo<SocketAddr> → ClientIp)         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Resolver (peer check, right-to-left header chain walk)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TrustRegistry (CIDR prefixes, header priority)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use remoteaddr::TrustRegistry;
//!
//! let mut registry = TrustRegistry::default();
//! registry
//!     .add_forwarders(["127.0.0.0/8"])
//!     .add_headers(["True-Client-IP"]);
//!
//! let headers = [("X-Forwarded-For", "31.69.99.22, 85.100.50.25")];
//! let ip = registry.resolve("127.0.0.1:52100", &headers)?;
//! assert_eq!(ip, "85.100.50.25");
//! # Ok::<(), remoteaddr::ResolveError>(())
//! ```
//!
//! ## Axum
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! use remoteaddr::{TrustRegistry, build_router};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let app = build_router(Arc::new(TrustRegistry::default()));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await
//! }
//! ```

pub mod cidr;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod registry;
pub mod resolver;
pub mod routes;

// Re-exports for convenience
pub use cidr::CidrRange;
pub use config::Config;
pub use error::{AppError, AppResult, ResolveError};
pub use middleware::ClientIpLayer;
pub use registry::TrustRegistry;
pub use resolver::{ClientIp, HeaderLookup, Source, split_host_port};
pub use routes::build_router;
