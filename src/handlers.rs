//! HTTP handlers.
//!
//! - `GET /` - Resolved client address of the caller
//! - `GET /health` - Liveness check

use axum::Json;
use tracing::instrument;

use crate::models::{HealthResponse, WhoAmIResponse};
use crate::resolver::ClientIp;

/// Report the caller's resolved address.
///
/// # Response Body
///
/// ```json
/// {
///   "ip": "85.100.50.25",
///   "source": "header",
///   "header": "X-Forwarded-For"
/// }
/// ```
#[instrument(skip_all, fields(client_ip = %client.addr))]
pub async fn whoami(client: ClientIp) -> Json<WhoAmIResponse> {
    Json(client.into())
}

/// Health check endpoint. Always returns 200 OK.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
