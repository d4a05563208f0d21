//! Raw requests from the transport and the context handed to applications.
//!
//! # Responsibilities
//! - Carry what the native listener knows about a request (`RawRequest`)
//! - Expose the immutable, decoded view of it (`RequestContext`)
//! - Keep header order and repeated values as the transport delivered them
//!
//! # Design Decisions
//! - The body is always a stream, possibly already exhausted, never absent
//! - Header lookups are case-insensitive; names are stored lowercased
//! - `RequestContext` metadata has getters only; the body is the one
//!   mutable part because reading a stream consumes it

use std::net::{IpAddr, SocketAddr};

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Version};
use serde::Serialize;
use uuid::Uuid;

use crate::routing::{Scheme, UrlPrefix};

/// Ordered header multimap.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(HeaderName, HeaderValue)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, keeping any earlier values for the same name.
    pub fn append(&mut self, name: HeaderName, value: HeaderValue) {
        self.entries.push((name, value));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.entries
            .iter()
            .find(|(key, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// First value for `name` if it is visible ASCII.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }

    /// Every value for `name`, in arrival order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a HeaderValue> + 'a {
        self.entries
            .iter()
            .filter(move |(key, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.entries.iter().map(|(name, value)| (name, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<&HeaderMap> for Headers {
    fn from(map: &HeaderMap) -> Self {
        map.iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl FromIterator<(HeaderName, HeaderValue)> for Headers {
    fn from_iter<I: IntoIterator<Item = (HeaderName, HeaderValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Request body stream.
#[derive(Debug, Default)]
pub struct RequestBody {
    inner: Body,
}

impl RequestBody {
    /// An already-exhausted stream.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(body: Body) -> Self {
        Self { inner: body }
    }

    /// True once no more data can be read.
    pub fn is_exhausted(&self) -> bool {
        self.inner.is_end_stream()
    }

    /// Read the remaining stream, failing if it exceeds `limit` bytes.
    ///
    /// The body is left exhausted afterwards.
    pub async fn read_to_end(&mut self, limit: usize) -> Result<Bytes, axum::Error> {
        axum::body::to_bytes(std::mem::take(&mut self.inner), limit).await
    }

    pub fn into_inner(self) -> Body {
        self.inner
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::new(Body::from(bytes))
    }
}

impl From<&'static str> for RequestBody {
    fn from(text: &'static str) -> Self {
        Self::new(Body::from(text))
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::new(Body::from(text))
    }
}

/// Connection-level facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub remote_ip: IpAddr,
    pub remote_port: u16,
    pub local_ip: IpAddr,
    pub local_port: u16,
    /// Remote and local IPs coincide, or the remote is loopback.
    pub is_local: bool,
}

impl ConnectionInfo {
    pub fn new(local: SocketAddr, remote: SocketAddr) -> Self {
        let local_ip = local.ip().to_canonical();
        let remote_ip = remote.ip().to_canonical();
        Self {
            remote_ip: remote.ip(),
            remote_port: remote.port(),
            local_ip: local.ip(),
            local_port: local.port(),
            is_local: remote_ip == local_ip || remote_ip.is_loopback(),
        }
    }
}

/// A request as produced by the native listener, not yet decoded.
#[derive(Debug)]
pub struct RawRequest {
    pub method: Method,
    /// Path and query exactly as received.
    pub raw_target: String,
    pub version: Version,
    pub headers: Headers,
    pub body: RequestBody,
    pub local_addr: SocketAddr,
    pub remote_addr: SocketAddr,
    /// Whether the accepting endpoint negotiated TLS.
    pub secure: bool,
}

impl RawRequest {
    /// An HTTP/1.1 request with no headers and an empty body.
    pub fn new(
        method: Method,
        raw_target: impl Into<String>,
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
    ) -> Self {
        Self {
            method,
            raw_target: raw_target.into(),
            version: Version::HTTP_11,
            headers: Headers::new(),
            body: RequestBody::empty(),
            local_addr,
            remote_addr,
            secure: false,
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Raw path, everything before `?`.
    pub fn raw_path(&self) -> &str {
        match self.raw_target.find('?') {
            Some(idx) => &self.raw_target[..idx],
            None => &self.raw_target,
        }
    }

    /// Raw query including its leading `?`, or `""`.
    pub fn raw_query(&self) -> &str {
        match self.raw_target.find('?') {
            Some(idx) => &self.raw_target[idx..],
            None => "",
        }
    }

    pub fn scheme(&self) -> Scheme {
        if self.secure {
            Scheme::Https
        } else {
            Scheme::Http
        }
    }

    /// Host the client addressed: the `Host` header without its port,
    /// falling back to the local IP.
    pub fn host(&self) -> String {
        match self.headers.get_str("host") {
            Some(value) if !value.is_empty() => strip_port(value).to_string(),
            _ => match self.local_addr.ip() {
                IpAddr::V6(ip) => format!("[{ip}]"),
                IpAddr::V4(ip) => ip.to_string(),
            },
        }
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

/// The decoded, routed view of a request.
#[derive(Debug)]
pub struct RequestContext {
    pub(crate) request_id: Uuid,
    pub(crate) method: Method,
    pub(crate) scheme: Scheme,
    pub(crate) path_base: String,
    pub(crate) path: String,
    pub(crate) query_string: String,
    pub(crate) version: Version,
    pub(crate) headers: Headers,
    pub(crate) body: RequestBody,
    pub(crate) connection: ConnectionInfo,
    pub(crate) prefix: UrlPrefix,
}

impl RequestContext {
    /// Trace identifier for this request.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Scheme of the prefix that accepted the request.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Decoded prefix path without trailing `/`; `""` for the root prefix.
    pub fn path_base(&self) -> &str {
        &self.path_base
    }

    /// Decoded remainder after `path_base`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query with its leading `?`, or `""`.
    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Protocol as text, e.g. `"HTTP/1.1"`.
    pub fn protocol(&self) -> &'static str {
        protocol_name(self.version)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body_mut(&mut self) -> &mut RequestBody {
        &mut self.body
    }

    pub fn connection(&self) -> &ConnectionInfo {
        &self.connection
    }

    /// The registered prefix that matched.
    pub fn prefix(&self) -> &UrlPrefix {
        &self.prefix
    }
}

fn protocol_name(version: Version) -> &'static str {
    if version == Version::HTTP_09 {
        "HTTP/0.9"
    } else if version == Version::HTTP_10 {
        "HTTP/1.0"
    } else if version == Version::HTTP_2 {
        "HTTP/2"
    } else if version == Version::HTTP_3 {
        "HTTP/3"
    } else {
        "HTTP/1.1"
    }
}
