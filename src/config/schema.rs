//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every field has a default, so an empty file is a valid configuration.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PrefixError;
use crate::routing::UrlPrefix;

/// Root configuration for the front end.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// URL prefixes to register, e.g. `"http://+:8080/api/"`.
    pub prefixes: Vec<String>,

    pub listener: ListenerConfig,

    pub timeouts: TimeoutConfig,

    pub observability: ObservabilityConfig,
}

impl ServerConfig {
    /// Parse every configured prefix.
    pub fn url_prefixes(&self) -> Result<Vec<UrlPrefix>, PrefixError> {
        self.prefixes.iter().map(|raw| UrlPrefix::parse(raw)).collect()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// IP every prefix port is bound on.
    pub bind_ip: IpAddr,

    /// Maximum concurrent connections per bound port (backpressure).
    pub max_connections: usize,

    /// Requests that may wait for dispatch before connections block.
    pub queue_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            max_connections: 10_000,
            queue_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Application deadline in seconds; 0 disables it.
    pub request_secs: u64,
}

impl TimeoutConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_secs > 0).then(|| Duration::from_secs(self.request_secs))
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
