//! The request front end.
//!
//! # Responsibilities
//! - Own the prefix table and dispatcher for one server instance
//! - Mirror prefix registration into the native listener
//! - Pull requests from the listener and dispatch each on its own task
//! - Apply configuration revisions by diffing the prefix set
//! - Stop on the shutdown broadcast, draining in-flight requests
//!
//! # Design Decisions
//! - No globals: every piece of state hangs off the instance, so several
//!   servers can run in one process
//! - Prefixes are registered with the listener before they enter the
//!   table, and leave the table before they are unregistered
//! - Add and remove are serialized, so the table and the listener agree
//!   once either returns

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinSet;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::http::dispatcher::{Application, Dispatcher, FaultSink};
use crate::net::transport::Transport;
use crate::observability::metrics;
use crate::routing::{PrefixTable, UrlPrefix};

/// How long shutdown waits for in-flight requests before aborting them.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpServer<T: Transport> {
    config: ArcSwap<ServerConfig>,
    transport: Arc<T>,
    table: Arc<PrefixTable>,
    dispatcher: Arc<Dispatcher>,
    /// Held across the table and transport steps of add/remove.
    control: Mutex<()>,
}

impl<T: Transport> HttpServer<T> {
    pub fn new(config: ServerConfig, transport: T) -> Self {
        let table = Arc::new(PrefixTable::new());
        let dispatcher = Dispatcher::new(Arc::clone(&table))
            .with_request_timeout(config.timeouts.request_timeout());
        Self {
            config: ArcSwap::from_pointee(config),
            transport: Arc::new(transport),
            table,
            dispatcher: Arc::new(dispatcher),
            control: Mutex::new(()),
        }
    }

    /// Replace the default tracing fault sink.
    pub fn with_fault_sink(mut self, faults: Arc<dyn FaultSink>) -> Self {
        let timeout = self.config.load().timeouts.request_timeout();
        self.dispatcher = Arc::new(
            Dispatcher::new(Arc::clone(&self.table))
                .with_fault_sink(faults)
                .with_request_timeout(timeout),
        );
        self
    }

    /// The configuration revision currently applied.
    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.load_full()
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn prefixes(&self) -> Arc<BTreeSet<UrlPrefix>> {
        self.table.snapshot()
    }

    /// Register a prefix. Returns whether it was new.
    pub async fn add_prefix(&self, prefix: UrlPrefix) -> Result<bool, ServerError> {
        let _control = self.control.lock().await;
        if self.table.contains(&prefix) {
            return Ok(false);
        }
        self.transport.register_prefix(&prefix).await?;
        let added = self.table.add(prefix.clone());
        metrics::set_registered_prefixes(self.table.len());
        tracing::info!(prefix = %prefix, "Prefix registered");
        Ok(added)
    }

    /// Unregister a prefix. Returns whether it was present.
    pub async fn remove_prefix(&self, prefix: &UrlPrefix) -> Result<bool, ServerError> {
        let _control = self.control.lock().await;
        if !self.table.remove(prefix) {
            return Ok(false);
        }
        metrics::set_registered_prefixes(self.table.len());
        self.transport.unregister_prefix(prefix).await?;
        tracing::info!(prefix = %prefix, "Prefix unregistered");
        Ok(true)
    }

    /// Move from the current configuration revision to `next`.
    ///
    /// Only prefixes that differ between the two revisions are touched;
    /// prefixes added through `add_prefix` survive a reload. Failures are
    /// logged per prefix and do not stop the rest of the diff.
    pub async fn apply_config(&self, next: ServerConfig) {
        let previous = self.config.load_full();
        let (Ok(old), Ok(new)) = (previous.url_prefixes(), next.url_prefixes()) else {
            tracing::error!("Configuration contains unparsable prefixes; ignoring revision");
            return;
        };
        let old: BTreeSet<UrlPrefix> = old.into_iter().collect();
        let new: BTreeSet<UrlPrefix> = new.into_iter().collect();

        for prefix in old.difference(&new) {
            if let Err(e) = self.remove_prefix(prefix).await {
                tracing::error!(prefix = %prefix, error = %e, "Failed to unregister prefix");
            }
        }
        for prefix in new.difference(&old) {
            if let Err(e) = self.add_prefix(prefix.clone()).await {
                tracing::error!(prefix = %prefix, error = %e, "Failed to register prefix");
            }
        }

        if previous.timeouts != next.timeouts || previous.listener != next.listener {
            tracing::warn!("Listener and timeout changes take effect on restart");
        }
        self.config.store(Arc::new(next));
        tracing::info!(prefixes = self.table.len(), "Configuration applied");
    }

    /// Serve until `shutdown` fires.
    ///
    /// Registers the configured prefixes first; any failure there is fatal.
    pub async fn run<A: Application>(
        &self,
        app: A,
        mut config_updates: mpsc::UnboundedReceiver<ServerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let configured = self.config.load_full().url_prefixes()?;
        for prefix in configured {
            self.add_prefix(prefix).await?;
        }
        tracing::info!(prefixes = self.table.len(), "HTTP server starting");

        let app = Arc::new(app);
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                pending = self.transport.accept_request() => {
                    let Some(pending) = pending else {
                        tracing::info!("Transport closed");
                        break;
                    };
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let app = Arc::clone(&app);
                    in_flight.spawn(async move {
                        dispatcher.dispatch(pending, app.as_ref()).await;
                    });
                }
                Some(next) = config_updates.recv() => {
                    self.apply_config(next).await;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Dispatch task failed");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
            }
        }

        for prefix in self.table.snapshot().iter() {
            if let Err(e) = self.remove_prefix(prefix).await {
                tracing::warn!(prefix = %prefix, error = %e, "Failed to unregister prefix");
            }
        }

        let remaining = in_flight.len();
        if remaining > 0 {
            tracing::info!(remaining, "Draining in-flight requests");
            let drain = async { while in_flight.join_next().await.is_some() {} };
            if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
                tracing::warn!("Drain timed out; aborting remaining requests");
                in_flight.abort_all();
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
