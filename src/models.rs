use serde::{Deserialize, Serialize};

use crate::resolver::ClientIp;

/// Resolved client address as returned by `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoAmIResponse {
    /// Resolved client IP address (no port)
    pub ip: String,
    /// Where the address came from: `peer`, `header` or `trusted_hop`
    pub source: String,
    /// Forwarding header the address was read from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
}

impl From<ClientIp> for WhoAmIResponse {
    fn from(client: ClientIp) -> Self {
        Self {
            ip: client.addr.to_string(),
            source: client.source.label().to_string(),
            header: client.source.header().map(str::to_string),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status
    pub status: String,
    /// Service version
    pub version: String,
}
