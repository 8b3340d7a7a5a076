//! Application configuration loaded from environment variables.
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//!
//! # Trust Configuration
//!
//! - `TRUSTED_PROXIES`: Comma-separated CIDR ranges appended to the trusted
//!   forwarders (e.g., `127.0.0.0/8,::1/128`)
//! - `CLIENT_IP_HEADERS`: Comma-separated header names consulted after the
//!   defaults (e.g., `True-Client-IP`)
//! - `TRUST_DEFAULT_FORWARDERS`: Seed with private networks, Cloudflare ranges
//!   and the default headers (default: true)
//!
//! Unlike [`TrustRegistry::add_forwarders`], configuration is validated up
//! front: a malformed CIDR or header name stops startup.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::HeaderName;

use crate::cidr::CidrRange;
use crate::error::{AppError, AppResult};
use crate::registry::TrustRegistry;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}', expected 'pretty' or 'json'")),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    // =========================================================================
    // Trust Configuration
    // =========================================================================
    /// Extra trusted forwarder CIDR ranges, appended after the defaults.
    pub trusted_proxies: Vec<String>,

    /// Extra forwarding headers, consulted after the defaults.
    pub client_ip_headers: Vec<String>,

    /// Seed the registry with the built-in prefixes and headers (default: true)
    pub trust_default_forwarders: bool,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Log output format (default: pretty)
    pub log_format: LogFormat,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if a value cannot be parsed or fails
    /// validation.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 3000)?,

            trusted_proxies: Self::parse_list("TRUSTED_PROXIES"),
            client_ip_headers: Self::parse_list("CLIENT_IP_HEADERS"),
            trust_default_forwarders: Self::parse_env("TRUST_DEFAULT_FORWARDERS", true)?,

            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            log_format: Self::parse_env("LOG_FORMAT", LogFormat::Pretty)?,
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate trusted proxy ranges and header names.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` naming the first invalid entry.
    pub fn validate(&self) -> AppResult<()> {
        if let Some(bad) = self
            .trusted_proxies
            .iter()
            .find(|p| CidrRange::parse(p).is_none())
        {
            return Err(AppError::ConfigError(format!(
                "TRUSTED_PROXIES entry '{bad}' is not a valid CIDR range"
            )));
        }

        if let Some(bad) = self
            .client_ip_headers
            .iter()
            .find(|h| HeaderName::from_bytes(h.as_bytes()).is_err())
        {
            return Err(AppError::ConfigError(format!(
                "CLIENT_IP_HEADERS entry '{bad}' is not a valid header name"
            )));
        }

        if !self.trust_default_forwarders && self.client_ip_headers.is_empty() {
            tracing::warn!(
                "TRUST_DEFAULT_FORWARDERS=false and no CLIENT_IP_HEADERS set, forwarding headers will never be read"
            );
        }

        Ok(())
    }

    /// Build the trust registry described by this configuration.
    pub fn build_registry(&self) -> TrustRegistry {
        let base = if self.trust_default_forwarders {
            TrustRegistry::default()
        } else {
            TrustRegistry::empty()
        };

        base.with_forwarders(self.trusted_proxies.iter().cloned())
            .with_headers(self.client_ip_headers.iter().cloned())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_enabled()
            .then(|| SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .trim()
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse a comma-separated list, dropping empty entries.
    fn parse_list(name: &str) -> Vec<String> {
        env::var(name)
            .map(|s| {
                s.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            trusted_proxies: vec![],
            client_ip_headers: vec![],
            trust_default_forwarders: true,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_port: 9090,
        }
    }
}
