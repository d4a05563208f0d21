//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (ids, live-connection tracking)
//!     → tcp.rs (hyper HTTP/1.1, one PendingRequest per request)
//!     → transport.rs (queue + response handle)
//!     → Hand off to the dispatcher
//! ```
//!
//! # Design Decisions
//! - Bounded accept and bounded request queue prevent resource exhaustion
//! - The dispatcher only sees the `Transport` trait, so tests can swap in
//!   an in-memory listener

pub mod connection;
pub mod listener;
pub mod tcp;
pub mod transport;

pub use tcp::TcpTransport;
pub use transport::{PendingRequest, RequestQueue, ResponseHandle, Transport};
