//! Plain-HTTP native listener over hyper.
//!
//! # Responsibilities
//! - Bind one bounded socket per registered port, on first registration
//! - Serve HTTP/1.1 connections and turn each request into a `PendingRequest`
//! - Close a port's socket once its last prefix is unregistered
//!
//! # Data Flow
//! ```text
//! socket → Listener::accept (permit) → hyper http1 connection
//!     → forward() → RequestQueue → accept_request()
//!     ← oneshot ResponseMessage ← ResponseHandle::write_response
//! ```
//!
//! # Design Decisions
//! - Host matching is left to the prefix table; a socket serves every
//!   host on its port
//! - Dropping the hyper service future (client gone) drops the response
//!   receiver, which is how the dispatcher learns about aborts
//! - hyper's `HeaderMap` groups repeated names, so requests from this
//!   transport keep value order per name but not the arrival order
//!   across names

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::config::ListenerConfig;
use crate::error::TransportError;
use crate::http::request::{Headers, RawRequest, RequestBody};
use crate::http::response::ResponseMessage;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{Listener, ListenerError};
use crate::net::transport::{PendingRequest, RequestQueue, Transport};
use crate::routing::{Scheme, UrlPrefix};

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

struct PortBinding {
    prefixes: HashSet<UrlPrefix>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

/// HTTP/1.1 transport on TCP sockets.
pub struct TcpTransport {
    bind_ip: IpAddr,
    max_connections: usize,
    sender: mpsc::Sender<PendingRequest>,
    queue: RequestQueue,
    ports: Mutex<HashMap<u16, PortBinding>>,
    tracker: ConnectionTracker,
}

impl TcpTransport {
    pub fn new(config: &ListenerConfig) -> Self {
        let (sender, queue) = RequestQueue::bounded(config.queue_capacity);
        Self {
            bind_ip: config.bind_ip,
            max_connections: config.max_connections,
            sender,
            queue,
            ports: Mutex::new(HashMap::new()),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Address bound for `port`, if any prefix uses it.
    pub async fn local_addr(&self, port: u16) -> Option<SocketAddr> {
        self.ports.lock().await.get(&port).map(|binding| binding.local_addr)
    }

    pub async fn bound_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.ports.lock().await.keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }
}

impl Transport for TcpTransport {
    async fn register_prefix(&self, prefix: &UrlPrefix) -> Result<(), TransportError> {
        if prefix.scheme() != Scheme::Http {
            return Err(TransportError::UnsupportedScheme(prefix.scheme().to_string()));
        }

        let mut ports = self.ports.lock().await;
        if let Some(binding) = ports.get_mut(&prefix.port()) {
            binding.prefixes.insert(prefix.clone());
            return Ok(());
        }

        let addr = SocketAddr::new(self.bind_ip, prefix.port());
        let listener = Listener::bind(addr, self.max_connections)
            .await
            .map_err(|e| bind_error(addr, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { addr: addr.to_string(), source })?;

        let accept_task = tokio::spawn(accept_loop(listener, self.sender.clone(), self.tracker.clone()));
        ports.insert(
            prefix.port(),
            PortBinding {
                prefixes: HashSet::from([prefix.clone()]),
                local_addr,
                accept_task,
            },
        );
        Ok(())
    }

    async fn unregister_prefix(&self, prefix: &UrlPrefix) -> Result<(), TransportError> {
        let mut ports = self.ports.lock().await;
        let Some(binding) = ports.get_mut(&prefix.port()) else {
            return Ok(());
        };
        binding.prefixes.remove(prefix);
        if binding.prefixes.is_empty() {
            if let Some(binding) = ports.remove(&prefix.port()) {
                binding.accept_task.abort();
                tracing::info!(address = %binding.local_addr, "Listener closed");
            }
        }
        Ok(())
    }

    async fn accept_request(&self) -> Option<PendingRequest> {
        self.queue.next().await
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        for binding in self.ports.get_mut().values() {
            binding.accept_task.abort();
        }
    }
}

fn bind_error(addr: SocketAddr, error: ListenerError) -> TransportError {
    match error {
        ListenerError::Bind(_, source) | ListenerError::Accept(source) => TransportError::Bind {
            addr: addr.to_string(),
            source,
        },
        ListenerError::Closed => TransportError::Closed,
    }
}

async fn accept_loop(listener: Listener, sender: mpsc::Sender<PendingRequest>, tracker: ConnectionTracker) {
    loop {
        let (stream, remote_addr, permit) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(ListenerError::Closed) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Accept failed");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                continue;
            }
        };
        let local_addr = match stream.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                tracing::warn!(peer_addr = %remote_addr, error = %e, "Dropping connection without local address");
                continue;
            }
        };

        let sender = sender.clone();
        let guard = tracker.track();
        tokio::spawn(async move {
            let _permit = permit;
            let connection_id = guard.id();
            let service = service_fn(move |request: Request<Incoming>| {
                let sender = sender.clone();
                async move { Ok::<_, Infallible>(forward(request, local_addr, remote_addr, sender).await) }
            });

            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!(connection_id = %connection_id, error = %e, "Connection ended with error");
            }
            drop(guard);
        });
    }
}

/// Queue one request and wait for the dispatcher's response.
async fn forward(
    request: Request<Incoming>,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    sender: mpsc::Sender<PendingRequest>,
) -> Response<Body> {
    let (parts, body) = request.into_parts();
    let raw_target = parts
        .uri
        .path_and_query()
        .map(|target| target.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let raw = RawRequest {
        method: parts.method,
        raw_target,
        version: parts.version,
        headers: Headers::from(&parts.headers),
        body: RequestBody::new(Body::new(body)),
        local_addr,
        remote_addr,
        secure: false,
    };

    let (pending, response_rx) = PendingRequest::new(raw);
    if sender.send(pending).await.is_err() {
        tracing::warn!(address = %local_addr, "Request queue closed");
        return ResponseMessage::empty(StatusCode::SERVICE_UNAVAILABLE).into();
    }

    match response_rx.await {
        Ok(message) => message.into(),
        Err(_) => ResponseMessage::empty(StatusCode::INTERNAL_SERVER_ERROR).into(),
    }
}
