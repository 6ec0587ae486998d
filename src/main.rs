//! pool-balancer
//!
//! ```text
//!     Client Request            ┌──────────────────────────────────────────────┐
//!     ──────────────────────────┼─▶ http::server ─▶ dispatcher ─▶ least_conn   │
//!                               │                       │                      │
//!                               │                       ▼                      │
//!     Client Response           │                 ServerPool ◀── health        │
//!     ◀─────────────────────────┼── response ◀── backend     ◀── recovery      │──── Backends
//!                               └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use pool_balancer::config::{load_config, validate_config, ConfigError, ConfigWatcher, ProxyConfig};
use pool_balancer::load_balancer::Algorithm;
use pool_balancer::observability::{logging, metrics};
use pool_balancer::{HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "pool-balancer", version, about = "Least-connections HTTP load balancer")]
struct Args {
    /// TOML config file. Watched for backend list changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:8080.
    #[arg(long)]
    bind: Option<String>,

    /// Backend address (host:port). Repeat for several; replaces the config list
    /// and pins it, so config reloads leave the pool alone.
    #[arg(short, long = "backend")]
    backends: Vec<String>,

    /// Seconds between health checks of healthy backends.
    #[arg(long)]
    health_interval: Option<u64>,

    /// Seconds between recovery checks of unhealthy backends.
    #[arg(long)]
    recovery_interval: Option<u64>,

    /// Per-probe deadline in seconds.
    #[arg(long)]
    probe_timeout: Option<u64>,

    /// Backend selection algorithm.
    #[arg(long, value_enum)]
    algorithm: Option<Algorithm>,
}

impl Args {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if !self.backends.is_empty() {
            config.backends = self.backends.clone();
        }
        if let Some(secs) = self.health_interval {
            config.health_check.interval_secs = secs;
        }
        if let Some(secs) = self.recovery_interval {
            config.health_check.recovery_interval_secs = secs;
        }
        if let Some(secs) = self.probe_timeout {
            config.health_check.timeout_secs = secs;
        }
        if let Some(algorithm) = self.algorithm {
            config.balancing.algorithm = algorithm;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    args.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pool-balancer starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = ?config.backends,
        health_interval_secs = config.health_check.interval_secs,
        recovery_interval_secs = config.health_check.recovery_interval_secs,
        probe_timeout_secs = config.health_check.timeout_secs,
        "Configuration loaded"
    );
    if config.backends.is_empty() {
        tracing::warn!("No backends configured; every request will get 503 until one is added");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher handle alive for the life of the process.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let mut server = HttpServer::new(config);
    if !args.backends.is_empty() {
        tracing::info!("Backends given on the command line; reloads will not change the pool");
        server = server.pin_backends();
    }
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
