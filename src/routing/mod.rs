//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (scheme, host, local port, raw path)
//!     → codec.rs (split on raw '/', percent-decode each segment)
//!     → table.rs (longest structural match over prefix.rs values)
//!     → Return: Resolution { prefix, path_base, path } or RouteError
//!
//! Prefix registration (startup or hot-add):
//!     "http://+:8080/api/"
//!     → prefix.rs (parse, decode, canonicalize)
//!     → table.rs (copy-on-write insert, atomic swap)
//! ```
//!
//! # Design Decisions
//! - Longest match by segment count, host precedence breaks ties
//! - Deterministic: same table and input always give the same split
//! - Readers never block on writers

pub mod codec;
pub mod prefix;
pub mod table;

pub use prefix::{HostPattern, Scheme, UrlPrefix};
pub use table::{PrefixTable, RequestTarget, Resolution};
