//! Prometheus metrics for client IP resolution.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `remoteaddr_resolutions_total` - Resolved requests (label: `source` =
//!   `peer`, `header` or `trusted_hop`)
//! - `remoteaddr_missing_peer_total` - Requests that arrived without
//!   connection info
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter, so the
//! library can be embedded without Prometheus.

use std::net::SocketAddr;

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::resolver::Source;

/// Metric names as constants for consistency.
pub mod names {
    pub const RESOLUTIONS_TOTAL: &str = "remoteaddr_resolutions_total";
    pub const MISSING_PEER_TOTAL: &str = "remoteaddr_missing_peer_total";
}

/// Install the Prometheus exporter with an HTTP listener on `metrics_addr`.
///
/// # Errors
///
/// Returns `AppError::Internal` if the exporter cannot be installed (a
/// recorder is already set, or the listener cannot bind).
pub fn init_metrics(metrics_addr: SocketAddr) -> AppResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| AppError::Internal(format!("Failed to install Prometheus exporter: {e}")))?;

    describe_counter!(
        names::RESOLUTIONS_TOTAL,
        "Total number of client IP resolutions by source"
    );
    describe_counter!(
        names::MISSING_PEER_TOTAL,
        "Total number of requests without connection peer address"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Count one resolution.
#[inline]
pub fn record_resolution(source: &Source) {
    counter!(names::RESOLUTIONS_TOTAL, "source" => source.label()).increment(1);
}

/// Count one request that could not be resolved for lack of a peer address.
#[inline]
pub fn record_missing_peer() {
    counter!(names::MISSING_PEER_TOTAL).increment(1);
}
