//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every healthy backend
//! - Demote backends whose probe failed, after the whole scan completes

use std::sync::Arc;
use std::time::Duration;
use futures_util::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::probe::Prober;
use crate::load_balancer::ServerPool;
use crate::observability::metrics;

pub struct HealthMonitor {
    pool: Arc<ServerPool>,
    prober: Prober,
    interval: Duration,
    concurrency: usize,
}

impl HealthMonitor {
    pub fn new(pool: Arc<ServerPool>, config: &HealthCheckConfig, prober: Prober) -> Self {
        Self {
            pool,
            prober,
            interval: Duration::from_secs(config.interval_secs),
            concurrency: config.concurrency.max(1),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Health monitor starting");

        // First scan one interval after start.
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every healthy backend once and demote the failures.
    ///
    /// Returns the addresses demoted by this scan.
    pub async fn check_all(&self) -> Vec<String> {
        let snapshot = self.pool.list_healthy();
        if snapshot.is_empty() {
            return Vec::new();
        }

        let prober = &self.prober;
        let results: Vec<_> = stream::iter(snapshot)
            .map(move |backend| async move {
                let outcome = prober.probe(&backend).await;
                (backend, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut demoted = Vec::new();
        for (backend, outcome) in results {
            metrics::record_probe("health", outcome.label());
            if outcome.is_healthy() {
                continue;
            }
            tracing::warn!(addr = %backend.addr(), reason = %outcome, "Health check failed");
            if self.pool.remove(backend.addr()) {
                tracing::warn!(
                    addr = %backend.addr(),
                    connections = backend.connections(),
                    "Backend is down, moved to unhealthy"
                );
                metrics::record_backend_health(backend.addr(), false);
                demoted.push(backend.addr().to_string());
            }
        }

        let (healthy, unhealthy) = self.pool.counts();
        metrics::record_pool_size(healthy, unhealthy);
        demoted
    }
}
