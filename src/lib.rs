//! HTTP request front end over a native listener.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌───────────────────────────────────────────────────┐
//!                     │                   WEB LISTENER                    │
//!                     │                                                   │
//!  Client Request     │  ┌─────────┐    ┌────────────┐    ┌───────────┐   │
//!  ───────────────────┼─▶│   net   │───▶│    http    │───▶│  routing  │   │
//!                     │  │transport│    │ dispatcher │    │  prefix   │   │
//!                     │  └─────────┘    └─────┬──────┘    │   table   │   │
//!                     │                       │           └───────────┘   │
//!                     │                       ▼                           │
//!                     │                ┌─────────────┐                    │
//!                     │                │ Application │                    │
//!                     │                └──────┬──────┘                    │
//!  Client Response    │  ┌─────────┐          │                           │
//!  ◀──────────────────┼──│response │◀─────────┘                           │
//!                     │  │ handle  │                                      │
//!                     │  └─────────┘                                      │
//!                     │  ┌─────────────────────────────────────────────┐  │
//!                     │  │ config · observability · lifecycle          │  │
//!                     │  └─────────────────────────────────────────────┘  │
//!                     └───────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::ServerConfig;
pub use error::{ApplicationFault, EncodingError, PrefixError, RouteError, ServerError, TransportError};
pub use http::{Application, Dispatcher, EchoApplication, HttpContext, HttpServer};
pub use lifecycle::Shutdown;
pub use net::{TcpTransport, Transport};
pub use routing::{PrefixTable, UrlPrefix};
