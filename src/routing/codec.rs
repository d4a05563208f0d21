//! Percent-decoding of request paths.
//!
//! # Responsibilities
//! - Decode `%XX` escapes into bytes and the byte runs into UTF-8 text
//! - Split raw paths into segments before decoding
//! - Encode text back into a path-safe form
//!
//! # Design Decisions
//! - Segment boundaries come from the raw path. `%2F` decodes to a `/`
//!   character inside its segment and never creates a new segment, so
//!   prefix matching and decoding always agree on where segments start.
//! - A `%` not followed by two hex digits passes through literally.
//! - `+` is not a space in paths and passes through unchanged.

use std::borrow::Cow;
use std::fmt;

use crate::error::EncodingError;

/// Percent-decode a raw path segment into text.
///
/// Returns `Cow::Borrowed` when the input has no escapes.
pub fn decode(raw: &str) -> Result<Cow<'_, str>, EncodingError> {
    if !raw.contains('%') {
        return Ok(Cow::Borrowed(raw));
    }

    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                if let (Some(hi), Some(lo)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                    decoded.push(hi << 4 | lo);
                    i += 3;
                } else {
                    decoded.push(b'%');
                    i += 1;
                }
            }
            b => {
                decoded.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(decoded)
        .map(Cow::Owned)
        .map_err(|e| EncodingError {
            input: raw.to_string(),
            valid_up_to: e.utf8_error().valid_up_to(),
        })
}

/// Percent-encode text so that it can be used as a single path segment.
///
/// Everything outside the RFC 3986 `pchar` set is escaped, including `/`
/// and `%`, so `decode(&encode(s))` always yields `s`.
pub fn encode(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for &b in text.as_bytes() {
        if is_pchar(b) {
            encoded.push(b as char);
        } else {
            encoded.push('%');
            encoded.push(HEX[(b >> 4) as usize] as char);
            encoded.push(HEX[(b & 0x0f) as usize] as char);
        }
    }
    encoded
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";

fn is_pchar(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'-' | b'.' | b'_' | b'~'
                | b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b';' | b'='
                | b':' | b'@'
        )
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// An absolute request path split on raw `/` boundaries and decoded.
///
/// `/` has one empty segment, `/a/` has `["a", ""]`, `/a` has `["a"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPath {
    segments: Vec<String>,
}

impl DecodedPath {
    /// Decode an absolute raw path (without query).
    pub fn parse(raw: &str) -> Result<Self, EncodingError> {
        let relative = raw.strip_prefix('/').unwrap_or(raw);
        let segments = relative
            .split('/')
            .map(|segment| decode(segment).map(Cow::into_owned))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    /// The decoded segments in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Rejoin the segments starting at `from`.
    ///
    /// Returns `""` when `from` is past the last segment.
    pub fn tail(&self, from: usize) -> String {
        join_segments(self.segments.get(from..).unwrap_or_default())
    }
}

impl fmt::Display for DecodedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_segments(&self.segments))
    }
}

/// `["a", "b"]` → `"/a/b"`, `[]` → `""`.
pub(crate) fn join_segments(segments: &[String]) -> String {
    let mut joined = String::new();
    for segment in segments {
        joined.push('/');
        joined.push_str(segment);
    }
    joined
}
