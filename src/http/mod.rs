//! HTTP request handling subsystem.
//!
//! # Data Flow
//! ```text
//! Transport (PendingRequest: RawRequest + ResponseHandle)
//!     → dispatcher.rs (request span, request id)
//!     → routing::PrefixTable::resolve (prefix, path base, decoded path)
//!     → builder.rs (RequestContext)
//!     → Application::handle (writes into response.rs ResponseWriter)
//!     → ResponseHandle::write_response
//! ```

pub mod builder;
pub mod dispatcher;
pub mod echo;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::{
    Application, BoxError, DispatchOutcome, DispatchState, Dispatcher, FaultSink, HttpContext,
    TracingFaultSink,
};
pub use echo::EchoApplication;
pub use request::{ConnectionInfo, Headers, RawRequest, RequestBody, RequestContext};
pub use response::{ResponseMessage, ResponseWriter};
pub use server::HttpServer;
