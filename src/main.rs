//! `weblistener` binary: serves the echo application on the configured
//! prefixes.

use std::path::PathBuf;

use clap::Parser;
use tokio::sync::mpsc;

use weblistener::config::{load_config, ConfigWatcher, ServerConfig};
use weblistener::observability::{logging, metrics};
use weblistener::{EchoApplication, HttpServer, Shutdown, TcpTransport};

#[derive(Debug, Parser)]
#[command(name = "weblistener", version, about = "HTTP request front end over URL prefixes")]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes.
    #[arg(short, long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "weblistener starting");
    tracing::info!(
        prefixes = config.prefixes.len(),
        bind_ip = %config.listener.bind_ip,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );
    if config.prefixes.is_empty() {
        tracing::warn!("No prefixes configured; nothing will be served");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher must stay alive for updates to keep flowing.
    let (_watcher, config_updates) = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    shutdown.trigger_on_ctrl_c();

    let transport = TcpTransport::new(&config.listener);
    let server = HttpServer::new(config, transport);
    server.run(EchoApplication, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
