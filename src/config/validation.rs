//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every prefix parses and names a usable port
//! - Validate value ranges (limits > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::error::PrefixError;
use crate::routing::UrlPrefix;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("prefix {prefix:?}: {source}")]
    Prefix {
        prefix: String,
        #[source]
        source: PrefixError,
    },

    #[error("prefix {0:?} uses port 0")]
    ZeroPort(String),

    #[error("listener.max_connections must be positive")]
    MaxConnections,

    #[error("listener.queue_capacity must be positive")]
    QueueCapacity,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),

    #[error("observability.log_level {0:?} is not a log level")]
    LogLevel(String),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for raw in &config.prefixes {
        match UrlPrefix::parse(raw) {
            Ok(prefix) if prefix.port() == 0 => errors.push(ValidationError::ZeroPort(raw.clone())),
            Ok(_) => {}
            Err(source) => errors.push(ValidationError::Prefix {
                prefix: raw.clone(),
                source,
            }),
        }
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::MaxConnections);
    }
    if config.listener.queue_capacity == 0 {
        errors.push(ValidationError::QueueCapacity);
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(observability.metrics_address.clone()));
    }
    if !LOG_LEVELS.contains(&observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::LogLevel(observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
