//! Registered URL prefixes.
//!
//! # Responsibilities
//! - Parse `scheme://host[:port]/path` prefix strings
//! - Canonicalize the path into decoded segments
//! - Decide whether a prefix structurally matches a request
//!
//! # Design Decisions
//! - The path is stored decoded, so `/base%E8%91%89path/` and
//!   `/base葉path/` are the same prefix
//! - A trailing `/` is always present in the canonical path
//! - Matching compares whole segments, never substrings: `/2` does not
//!   match `/200`

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PrefixError;
use crate::routing::codec::{self, join_segments, DecodedPath};

/// URL scheme of a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// Port used when a prefix string omits one.
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl FromStr for Scheme {
    type Err = PrefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("http") {
            Ok(Scheme::Http)
        } else if s.eq_ignore_ascii_case("https") {
            Ok(Scheme::Https)
        } else {
            Err(PrefixError::Scheme(s.to_string()))
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host part of a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HostPattern {
    /// `+`: any host, preferred over explicit hosts.
    Strong,
    /// A DNS name or IP literal, compared case-insensitively.
    Explicit(String),
    /// `*`: any host not claimed by a strong wildcard or explicit host.
    Weak,
}

impl HostPattern {
    pub fn parse(raw: &str) -> Result<Self, PrefixError> {
        match raw {
            "" => Err(PrefixError::MissingHost(raw.to_string())),
            "+" => Ok(HostPattern::Strong),
            "*" => Ok(HostPattern::Weak),
            _ => url::Host::parse(raw)
                .map(|host| HostPattern::Explicit(host.to_string()))
                .map_err(|e| PrefixError::Host {
                    host: raw.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    /// `host` must already be normalized with [`normalize_host`].
    pub fn matches(&self, host: &str) -> bool {
        match self {
            HostPattern::Strong | HostPattern::Weak => true,
            HostPattern::Explicit(expected) => expected == host,
        }
    }

    /// Tie-break between prefixes with the same segment count.
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            HostPattern::Strong => 2,
            HostPattern::Explicit(_) => 1,
            HostPattern::Weak => 0,
        }
    }
}

impl fmt::Display for HostPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostPattern::Strong => f.write_str("+"),
            HostPattern::Weak => f.write_str("*"),
            HostPattern::Explicit(host) => f.write_str(host),
        }
    }
}

/// Normalize a request host the same way explicit prefix hosts are.
pub fn normalize_host(raw: &str) -> String {
    url::Host::parse(raw)
        .map(|host| host.to_string())
        .unwrap_or_else(|_| raw.to_ascii_lowercase())
}

/// A registered `(scheme, host, port, path)` tuple.
///
/// Identified by value; immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UrlPrefix {
    scheme: Scheme,
    host: HostPattern,
    port: u16,
    path: String,
    base: String,
    segments: Vec<String>,
}

impl UrlPrefix {
    /// Build a prefix from its parts. `path` may be percent-encoded.
    pub fn new(scheme: Scheme, host: &str, port: u16, path: &str) -> Result<Self, PrefixError> {
        let host = HostPattern::parse(host)?;
        let path = if path.is_empty() { "/" } else { path };
        let relative = path
            .strip_prefix('/')
            .ok_or_else(|| PrefixError::RelativePath(path.to_string()))?;
        let relative = relative.strip_suffix('/').unwrap_or(relative);

        let segments = if relative.is_empty() {
            Vec::new()
        } else {
            relative
                .split('/')
                .map(|segment| codec::decode(segment).map(Cow::into_owned))
                .collect::<Result<Vec<_>, _>>()?
        };

        // A '/' decoded from %2F stays escaped so the canonical path keeps
        // the segment boundaries.
        let mut canonical = String::new();
        for segment in &segments {
            canonical.push('/');
            canonical.push_str(&segment.replace('/', "%2F"));
        }
        canonical.push('/');
        let base = join_segments(&segments);

        Ok(Self {
            scheme,
            host,
            port,
            path: canonical,
            base,
            segments,
        })
    }

    /// Parse `scheme://host[:port]/path`.
    pub fn parse(input: &str) -> Result<Self, PrefixError> {
        let (scheme, rest) = input
            .split_once("://")
            .ok_or_else(|| PrefixError::Scheme(input.to_string()))?;
        let scheme: Scheme = scheme.parse()?;

        let (authority, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, "/"),
        };
        let (host, port) = split_authority(authority)?;
        let port = match port {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| PrefixError::Port(port.to_string()))?,
            None => scheme.default_port(),
        };

        Self::new(scheme, host, port, path)
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &HostPattern {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Canonical decoded path, always ending in `/`. A `/` inside a
    /// segment is shown as `%2F`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The PathBase reported for requests under this prefix: the path
    /// without its trailing `/`, so `""` for the root prefix.
    pub fn path_base(&self) -> &str {
        &self.base
    }

    /// Structural match against a request. `host` must be normalized.
    pub fn matches(&self, scheme: Scheme, host: &str, port: u16, path: &DecodedPath) -> bool {
        self.scheme == scheme
            && self.port == port
            && self.host.matches(host)
            && path.segments().len() >= self.segments.len()
            && self
                .segments
                .iter()
                .zip(path.segments())
                .all(|(expected, actual)| expected == actual)
    }
}

impl FromStr for UrlPrefix {
    type Err = PrefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for UrlPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
    }
}

/// Split `host[:port]`, keeping IPv6 brackets on the host.
fn split_authority(authority: &str) -> Result<(&str, Option<&str>), PrefixError> {
    if authority.is_empty() {
        return Err(PrefixError::MissingHost(authority.to_string()));
    }

    if authority.starts_with('[') {
        let end = authority.find(']').ok_or_else(|| PrefixError::Host {
            host: authority.to_string(),
            reason: "unterminated IPv6 literal".to_string(),
        })?;
        let (host, rest) = authority.split_at(end + 1);
        return match rest.strip_prefix(':') {
            Some(port) => Ok((host, Some(port))),
            None if rest.is_empty() => Ok((host, None)),
            None => Err(PrefixError::Port(rest.to_string())),
        };
    }

    Ok(match authority.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
    })
}
