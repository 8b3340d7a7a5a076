//! Application routing configuration with middleware stack.
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │    Client IP     │ ← Resolves ClientIp from ConnectInfo + headers
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          │
//!          ▼
//!      Handler
//! ```

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::middleware::ClientIpLayer;
use crate::registry::TrustRegistry;

/// Build the application router.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so the
/// client IP layer can see the connection peer.
pub fn build_router(registry: Arc<TrustRegistry>) -> Router {
    info!(
        prefixes = registry.prefixes().count(),
        headers = ?registry.headers(),
        "Client IP resolution configured"
    );

    Router::new()
        .route("/", get(handlers::whoami))
        .route("/health", get(handlers::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(ClientIpLayer::new(registry))
}
