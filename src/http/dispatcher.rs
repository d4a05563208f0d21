//! Per-request dispatch.
//!
//! # States
//! ```text
//! Received → ContextBuilt → AppInvoked → ResponseFlushed → Retired
//!                               │
//!                               └──────→ Faulted (application failed)
//! ```
//! Routing failures are answered before a context exists and retire
//! directly. A closed connection retires the request without a response
//! and without reporting a fault.
//!
//! # Design Decisions
//! - Panics and errors from the application are contained per request
//! - The response is always completed before a fault is reported
//! - The request context (and its body stream) is dropped on every exit path

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{Method, StatusCode};
use futures_util::FutureExt;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{ApplicationFault, RouteError};
use crate::http::builder::build_context;
use crate::http::request::RequestContext;
use crate::http::response::{ResponseMessage, ResponseWriter};
use crate::net::transport::{PendingRequest, ResponseHandle};
use crate::observability::metrics;
use crate::routing::{PrefixTable, RequestTarget};

/// Error type applications may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything an application sees for one request.
#[derive(Debug)]
pub struct HttpContext {
    pub request: RequestContext,
    pub response: ResponseWriter,
}

impl HttpContext {
    pub fn new(request: RequestContext) -> Self {
        Self {
            request,
            response: ResponseWriter::new(),
        }
    }
}

/// The application callback, invoked once per resolved request.
pub trait Application: Send + Sync + 'static {
    fn handle(&self, ctx: &mut HttpContext) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// Receives application faults.
pub trait FaultSink: Send + Sync {
    fn report(&self, request_id: Uuid, fault: &ApplicationFault);
}

/// Logs faults and counts them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFaultSink;

impl FaultSink for TracingFaultSink {
    fn report(&self, request_id: Uuid, fault: &ApplicationFault) {
        tracing::error!(request_id = %request_id, error = %fault, "Application fault");
        metrics::record_fault(fault.kind());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Received,
    ContextBuilt,
    AppInvoked,
    ResponseFlushed,
    Retired,
    Faulted,
}

impl DispatchState {
    fn advance(&mut self, next: DispatchState) {
        tracing::trace!(from = ?*self, to = ?next, "Dispatch state");
        *self = next;
    }
}

/// How a dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The application finished and its response was written.
    Completed { status: StatusCode },
    /// Routing failed; the application was not invoked.
    Rejected { status: StatusCode, error: RouteError },
    /// The application failed; a 500 response was written (if the
    /// connection was still open) and the fault was reported.
    Faulted { status: StatusCode, fault: ApplicationFault },
    /// The connection closed before a response could be written.
    Aborted,
}

impl DispatchOutcome {
    pub fn final_state(&self) -> DispatchState {
        match self {
            DispatchOutcome::Faulted { .. } => DispatchState::Faulted,
            _ => DispatchState::Retired,
        }
    }

    /// Status sent to the client, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DispatchOutcome::Completed { status }
            | DispatchOutcome::Rejected { status, .. }
            | DispatchOutcome::Faulted { status, .. } => Some(*status),
            DispatchOutcome::Aborted => None,
        }
    }
}

/// Routes raw requests and runs the application on them.
pub struct Dispatcher {
    table: Arc<PrefixTable>,
    faults: Arc<dyn FaultSink>,
    request_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(table: Arc<PrefixTable>) -> Self {
        Self {
            table,
            faults: Arc::new(TracingFaultSink),
            request_timeout: None,
        }
    }

    pub fn with_fault_sink(mut self, faults: Arc<dyn FaultSink>) -> Self {
        self.faults = faults;
        self
    }

    /// Deadline for the application; `None` waits indefinitely.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn table(&self) -> &Arc<PrefixTable> {
        &self.table
    }

    /// Route, build the context, invoke `app`, and complete the response.
    pub async fn dispatch<A: Application>(&self, pending: PendingRequest, app: &A) -> DispatchOutcome {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            method = %pending.request.method,
            target = %pending.request.raw_target,
        );
        self.run(request_id, pending, app).instrument(span).await
    }

    async fn run<A: Application>(
        &self,
        request_id: Uuid,
        pending: PendingRequest,
        app: &A,
    ) -> DispatchOutcome {
        let start = Instant::now();
        let PendingRequest {
            request,
            mut responder,
        } = pending;
        let method = request.method.clone();
        let mut state = DispatchState::Received;

        let host = request.host();
        let target = RequestTarget {
            scheme: request.scheme(),
            host: &host,
            port: request.local_addr.port(),
            raw_path: request.raw_path(),
        };
        let resolution = match self.table.resolve(&target) {
            Ok(resolution) => resolution,
            Err(error) => return reject(responder, error, &method, start),
        };

        tracing::debug!(
            prefix = %resolution.prefix,
            path_base = %resolution.path_base,
            path = %resolution.path,
            "Request resolved"
        );

        let mut ctx = HttpContext::new(build_context(request, resolution, request_id));
        state.advance(DispatchState::ContextBuilt);

        state.advance(DispatchState::AppInvoked);
        let invocation = invoke(app, &mut ctx, self.request_timeout);
        let result = tokio::select! {
            biased;
            result = invocation => Some(result),
            _ = responder.closed() => None,
        };

        let HttpContext { request, response } = ctx;
        drop(request);

        let Some(result) = result else {
            tracing::debug!("Connection closed before the application finished");
            metrics::record_abort();
            state.advance(DispatchState::Retired);
            return DispatchOutcome::Aborted;
        };

        match result {
            Ok(()) => {
                let message = response.finish();
                let status = message.status;
                if responder.write_response(message).is_err() {
                    tracing::debug!("Connection closed before the response was written");
                    metrics::record_abort();
                    state.advance(DispatchState::Retired);
                    return DispatchOutcome::Aborted;
                }
                state.advance(DispatchState::ResponseFlushed);
                metrics::record_request(&method, status, start);
                state.advance(DispatchState::Retired);
                DispatchOutcome::Completed { status }
            }
            Err(fault) => {
                let started = response.has_started();
                let intended = response.status();
                let message = response.into_faulted();
                let status = message.status;
                if responder.write_response(message).is_ok() {
                    state.advance(DispatchState::ResponseFlushed);
                    metrics::record_request(&method, status, start);
                } else {
                    tracing::debug!("Connection closed before the fault response was written");
                }
                tracing::warn!(
                    started,
                    intended_status = %intended,
                    "Application faulted; response completed with 500"
                );
                self.faults.report(request_id, &fault);
                state.advance(DispatchState::Faulted);
                DispatchOutcome::Faulted { status, fault }
            }
        }
    }
}

/// Run the application, turning errors, panics and deadline expiry into faults.
async fn invoke<A: Application>(
    app: &A,
    ctx: &mut HttpContext,
    timeout: Option<Duration>,
) -> Result<(), ApplicationFault> {
    let call = AssertUnwindSafe(app.handle(ctx)).catch_unwind();
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(ApplicationFault::TimedOut(limit)),
        },
        None => call.await,
    };

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(ApplicationFault::Failed(error.to_string())),
        Err(panic) => Err(ApplicationFault::Panicked(panic_message(panic.as_ref()))),
    }
}

fn reject(
    responder: ResponseHandle,
    error: RouteError,
    method: &Method,
    start: Instant,
) -> DispatchOutcome {
    let (status, reason) = match &error {
        RouteError::NoMatch { .. } => (StatusCode::NOT_FOUND, "no_match"),
        RouteError::Encoding(_) => (StatusCode::BAD_REQUEST, "encoding"),
    };
    tracing::warn!(error = %error, status = %status, "Request rejected");
    metrics::record_rejection(reason);

    if responder.write_response(ResponseMessage::empty(status)).is_err() {
        tracing::debug!("Connection closed before the rejection was written");
    } else {
        metrics::record_request(method, status, start);
    }
    DispatchOutcome::Rejected { status, error }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
