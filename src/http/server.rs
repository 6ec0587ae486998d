//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the dispatcher as catch-all handler
//! - Wire up middleware (request ID, tracing)
//! - Spawn the health and recovery monitors
//! - Apply backend list changes from config reloads
//! - Serve the admin API when enabled
//! - Serve until the shutdown broadcast fires

use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::ProxyConfig;
use crate::health::{HealthMonitor, Prober, RecoveryMonitor};
use crate::http::dispatcher::Dispatcher;
use crate::load_balancer::ServerPool;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    pool: Arc<ServerPool>,
    reload_backends: bool,
}

impl HttpServer {
    /// Create a new HTTP server, seeding the pool from `config.backends`.
    pub fn new(config: ProxyConfig) -> Self {
        let pool = Arc::new(ServerPool::with_backends(&config.backends));
        Self::with_pool(config, pool)
    }

    /// Create a server around an existing pool.
    pub fn with_pool(config: ProxyConfig, pool: Arc<ServerPool>) -> Self {
        let dispatcher = Arc::new(Dispatcher::from_config(pool.clone(), &config));
        let router = Self::build_router(AppState { dispatcher });
        Self {
            router,
            config,
            pool,
            reload_backends: true,
        }
    }

    /// Keep the startup backend list across config reloads.
    ///
    /// Used when backends come from the command line rather than the file.
    pub fn pin_backends(mut self) -> Self {
        self.reload_backends = false;
        self
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The shared backend pool.
    pub fn pool(&self) -> Arc<ServerPool> {
        self.pool.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let (healthy, unhealthy) = self.pool.counts();
        tracing::info!(
            address = %addr,
            backends = healthy + unhealthy,
            algorithm = ?self.config.balancing.algorithm,
            "HTTP server starting"
        );
        metrics::record_pool_size(healthy, unhealthy);

        let hc = &self.config.health_check;
        if hc.enabled {
            let prober = Prober::new(hc);
            let health = HealthMonitor::new(self.pool.clone(), hc, prober.clone());
            let recovery = RecoveryMonitor::new(self.pool.clone(), hc, prober);
            tokio::spawn(health.run(shutdown.resubscribe()));
            tokio::spawn(recovery.run(shutdown.resubscribe()));
        } else {
            tracing::info!("Health checks disabled");
        }

        tokio::spawn(apply_config_updates(
            self.pool.clone(),
            self.reload_backends,
            config_updates,
            shutdown.resubscribe(),
        ));

        if self.config.admin.enabled {
            let admin_listener = TcpListener::bind(&self.config.admin.bind_address).await?;
            tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
            let admin = setup_admin_router(self.pool.clone(), &self.config.admin.api_key);
            let mut admin_shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                let served = axum::serve(admin_listener, admin)
                    .with_graceful_shutdown(async move {
                        let _ = admin_shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = served {
                    tracing::error!(error = %e, "Admin API stopped");
                }
            });
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: every method and path goes to the dispatcher.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    match state.dispatcher.dispatch(request, client).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

/// Reconcile the pool with every reloaded backend list, unless it is pinned.
async fn apply_config_updates(
    pool: Arc<ServerPool>,
    reload_backends: bool,
    mut updates: mpsc::UnboundedReceiver<ProxyConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                if !reload_backends {
                    tracing::info!("Config reloaded; backend list pinned at startup, pool unchanged");
                    continue;
                }
                pool.reconcile(&config.backends);
                let (healthy, unhealthy) = pool.counts();
                tracing::info!(healthy, unhealthy, "Backend list reloaded");
                metrics::record_pool_size(healthy, unhealthy);
            }
            _ = shutdown.recv() => break,
        }
    }
}
