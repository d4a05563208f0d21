//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use weblistener::config::{ListenerConfig, ServerConfig};
use weblistener::error::{ApplicationFault, TransportError};
use weblistener::http::{
    Application, FaultSink, HttpServer, RawRequest, ResponseMessage,
};
use weblistener::net::{PendingRequest, RequestQueue, TcpTransport, Transport};
use weblistener::routing::UrlPrefix;
use weblistener::Shutdown;

/// A listener that lives in memory: tests push raw requests and read the
/// responses back.
pub struct MemoryTransport {
    sender: mpsc::Sender<PendingRequest>,
    queue: RequestQueue,
    registered: Mutex<BTreeSet<UrlPrefix>>,
    unregister_delay: Duration,
}

impl MemoryTransport {
    pub fn new() -> Self {
        let (sender, queue) = RequestQueue::bounded(64);
        Self {
            sender,
            queue,
            registered: Mutex::new(BTreeSet::new()),
            unregister_delay: Duration::ZERO,
        }
    }

    /// Make every unregister take `delay` before it lands.
    pub fn with_unregister_delay(mut self, delay: Duration) -> Self {
        self.unregister_delay = delay;
        self
    }

    pub fn registered(&self) -> BTreeSet<UrlPrefix> {
        self.registered.lock().unwrap().clone()
    }

    /// Queue a request; the receiver yields its response.
    pub async fn send(&self, request: RawRequest) -> oneshot::Receiver<ResponseMessage> {
        let (pending, response_rx) = PendingRequest::new(request);
        self.sender.send(pending).await.unwrap();
        response_rx
    }
}

impl Transport for MemoryTransport {
    async fn register_prefix(&self, prefix: &UrlPrefix) -> Result<(), TransportError> {
        self.registered.lock().unwrap().insert(prefix.clone());
        Ok(())
    }

    async fn unregister_prefix(&self, prefix: &UrlPrefix) -> Result<(), TransportError> {
        if !self.unregister_delay.is_zero() {
            tokio::time::sleep(self.unregister_delay).await;
        }
        self.registered.lock().unwrap().remove(prefix);
        Ok(())
    }

    async fn accept_request(&self) -> Option<PendingRequest> {
        self.queue.next().await
    }
}

/// Fault sink that keeps everything it is given.
#[derive(Default)]
pub struct RecordingSink {
    faults: Mutex<Vec<(Uuid, ApplicationFault)>>,
}

impl RecordingSink {
    pub fn faults(&self) -> Vec<(Uuid, ApplicationFault)> {
        self.faults.lock().unwrap().clone()
    }
}

impl FaultSink for RecordingSink {
    fn report(&self, request_id: Uuid, fault: &ApplicationFault) {
        self.faults.lock().unwrap().push((request_id, fault.clone()));
    }
}

pub fn config_with(prefixes: &[String]) -> ServerConfig {
    ServerConfig {
        prefixes: prefixes.to_vec(),
        listener: ListenerConfig {
            bind_ip: "127.0.0.1".parse().unwrap(),
            max_connections: 64,
            queue_capacity: 64,
        },
        ..ServerConfig::default()
    }
}

/// A GET for `target` arriving on `port` over loopback.
pub fn get(target: &str, port: u16) -> RawRequest {
    let local: SocketAddr = SocketAddr::from(([127, 0, 0, 1], port));
    let remote: SocketAddr = "127.0.0.1:45000".parse().unwrap();
    RawRequest::new(axum::http::Method::GET, target, local, remote)
}

/// A running server plus what tests need to drive and stop it.
pub struct Running<T: Transport> {
    pub server: Arc<HttpServer<T>>,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<ServerConfig>,
    pub task: tokio::task::JoinHandle<()>,
}

impl<T: Transport> Running<T> {
    pub async fn stop(self) {
        self.shutdown.trigger();
        self.task.await.unwrap();
    }
}

/// Spawn `server.run(app, ..)` and wait until its configured prefixes are
/// registered.
pub async fn start<T: Transport, A: Application>(server: HttpServer<T>, app: A) -> Running<T> {
    let expected = server.config().prefixes.len();
    let server = Arc::new(server);
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();

    let task = tokio::spawn({
        let server = Arc::clone(&server);
        async move {
            server.run(app, updates_rx, server_shutdown).await.unwrap();
        }
    });

    wait_until(|| server.prefixes().len() >= expected).await;

    Running {
        server,
        shutdown,
        config_updates,
        task,
    }
}

/// Start the echo application on real sockets.
pub async fn start_echo(prefixes: &[String]) -> Running<TcpTransport> {
    let config = config_with(prefixes);
    let transport = TcpTransport::new(&config.listener);
    start(HttpServer::new(config, transport), weblistener::EchoApplication).await
}

/// Poll `condition` until it holds, failing after two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
