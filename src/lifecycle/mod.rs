//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging/metrics → Register prefixes
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C / trigger() → run loop stops accepting → prefixes unregistered → Exit
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
