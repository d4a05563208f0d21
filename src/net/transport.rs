//! Native listener contract.
//!
//! # Responsibilities
//! - Define what the front end needs from a listener: prefix
//!   registration, one raw request per accept, one response per request
//! - Provide the queue and response handle transports build on
//!
//! # Design Decisions
//! - A response handle is consumed by `write_response`, so a request can
//!   be answered at most once
//! - A dropped receiver means the client went away; writers see
//!   `TransportError::Aborted` and callers can wait on `closed()`

use std::future::Future;

use tokio::sync::{mpsc, oneshot, Mutex};

use crate::error::TransportError;
use crate::http::request::RawRequest;
use crate::http::response::ResponseMessage;
use crate::routing::UrlPrefix;

/// A native HTTP listener.
pub trait Transport: Send + Sync + 'static {
    /// Start accepting requests for `prefix`. Idempotent.
    fn register_prefix(
        &self,
        prefix: &UrlPrefix,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Stop accepting requests for `prefix`. Unknown prefixes are a no-op.
    fn unregister_prefix(
        &self,
        prefix: &UrlPrefix,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Wait for the next request. `None` once the transport is closed.
    fn accept_request(&self) -> impl Future<Output = Option<PendingRequest>> + Send;
}

/// A request waiting for its response.
#[derive(Debug)]
pub struct PendingRequest {
    pub request: RawRequest,
    pub responder: ResponseHandle,
}

impl PendingRequest {
    /// Pair a request with a fresh response handle.
    ///
    /// The receiver resolves with the response, or errors if the request
    /// was retired without one.
    pub fn new(request: RawRequest) -> (Self, oneshot::Receiver<ResponseMessage>) {
        let (responder, response_rx) = ResponseHandle::channel();
        (Self { request, responder }, response_rx)
    }
}

/// Where the response for one request goes.
#[derive(Debug)]
pub struct ResponseHandle {
    tx: oneshot::Sender<ResponseMessage>,
}

impl ResponseHandle {
    pub fn channel() -> (Self, oneshot::Receiver<ResponseMessage>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Hand the complete response to the transport.
    pub fn write_response(self, response: ResponseMessage) -> Result<(), TransportError> {
        self.tx.send(response).map_err(|_| TransportError::Aborted)
    }

    /// True once the connection can no longer take a response.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves when the connection can no longer take a response.
    pub async fn closed(&mut self) {
        self.tx.closed().await;
    }
}

/// Bounded hand-off between connection tasks and the accept loop.
#[derive(Debug)]
pub struct RequestQueue {
    rx: Mutex<mpsc::Receiver<PendingRequest>>,
}

impl RequestQueue {
    pub fn bounded(capacity: usize) -> (mpsc::Sender<PendingRequest>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx: Mutex::new(rx) })
    }

    /// Next queued request, or `None` once every sender is gone.
    pub async fn next(&self) -> Option<PendingRequest> {
        self.rx.lock().await.recv().await
    }
}
