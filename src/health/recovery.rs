//! Recovery checking.
//!
//! Probes every unhealthy backend on a slower schedule and promotes each one
//! as soon as its probe succeeds. No probation: first success promotes.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use futures_util::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::probe::Prober;
use crate::load_balancer::ServerPool;
use crate::observability::metrics;

pub struct RecoveryMonitor {
    pool: Arc<ServerPool>,
    prober: Prober,
    interval: Duration,
    concurrency: usize,
}

impl RecoveryMonitor {
    pub fn new(pool: Arc<ServerPool>, config: &HealthCheckConfig, prober: Prober) -> Self {
        Self {
            pool,
            prober,
            interval: Duration::from_secs(config.recovery_interval_secs),
            concurrency: config.concurrency.max(1),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Recovery monitor starting");

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Recovery monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every unhealthy backend once, promoting successes as they land.
    ///
    /// Returns the addresses promoted by this scan.
    pub async fn check_all(&self) -> Vec<String> {
        let snapshot = self.pool.list_unhealthy();
        if snapshot.is_empty() {
            return Vec::new();
        }

        let prober = &self.prober;
        let mut results = pin!(stream::iter(snapshot)
            .map(move |backend| async move {
                let outcome = prober.probe(&backend).await;
                (backend, outcome)
            })
            .buffer_unordered(self.concurrency));

        let mut promoted = Vec::new();
        while let Some((backend, outcome)) = results.next().await {
            metrics::record_probe("recovery", outcome.label());
            if !outcome.is_healthy() {
                tracing::debug!(addr = %backend.addr(), reason = %outcome, "Backend still unhealthy");
                continue;
            }
            if self.pool.promote(backend.addr()) {
                tracing::info!(addr = %backend.addr(), "Backend is back online");
                metrics::record_backend_health(backend.addr(), true);
                promoted.push(backend.addr().to_string());
            }
        }

        let (healthy, unhealthy) = self.pool.counts();
        metrics::record_pool_size(healthy, unhealthy);
        promoted
    }
}
