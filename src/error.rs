//! Error taxonomy for the request front end.
//!
//! Routing failures (`RouteError`) are resolved at the routing boundary and
//! never reach the application. Application faults are contained per request.
//! Transport aborts retire a request without reporting a fault.

use std::time::Duration;
use thiserror::Error;

/// A percent-escape sequence decoded to bytes that are not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid UTF-8 after percent-decoding {input:?} (byte offset {valid_up_to})")]
pub struct EncodingError {
    /// The raw text that failed to decode.
    pub input: String,
    /// Number of decoded bytes that formed valid UTF-8 before the failure.
    pub valid_up_to: usize,
}

/// Errors produced while parsing a URL prefix string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrefixError {
    #[error("unsupported scheme {0:?} (expected http or https)")]
    Scheme(String),

    #[error("prefix {0:?} has no host")]
    MissingHost(String),

    #[error("invalid host {host:?}: {reason}")]
    Host { host: String, reason: String },

    #[error("invalid port {0:?}")]
    Port(String),

    #[error("prefix path {0:?} must start with '/'")]
    RelativePath(String),

    #[error("prefix path is not decodable: {0}")]
    Encoding(#[from] EncodingError),
}

/// Request rejected before a context is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// No registered prefix matches the request.
    #[error("no registered prefix matches {host}:{port}{path}")]
    NoMatch { host: String, port: u16, path: String },

    /// The request path is not decodable.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// An application callback failed to complete normally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplicationFault {
    #[error("application returned an error: {0}")]
    Failed(String),

    #[error("application panicked: {0}")]
    Panicked(String),

    #[error("application did not finish within {0:?}")]
    TimedOut(Duration),
}

impl ApplicationFault {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ApplicationFault::Failed(_) => "error",
            ApplicationFault::Panicked(_) => "panic",
            ApplicationFault::TimedOut(_) => "timeout",
        }
    }
}

/// Errors raised by a native listener transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer went away before the response could be written.
    #[error("connection aborted before the response was written")]
    Aborted,

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport does not serve {0} prefixes")]
    UnsupportedScheme(String),

    #[error("transport is closed")]
    Closed,
}

/// Errors surfaced by the server control path.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Prefix(#[from] PrefixError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
