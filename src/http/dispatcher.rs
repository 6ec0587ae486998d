//! Per-request dispatch.
//!
//! # Flow
//! ```text
//! pool.list_healthy()            → empty: 503
//!     → LoadBalancer::next_server → None: 503
//!     → backend.acquire()         (connection +1)
//!     → forward with timeout      → error: 502, timeout: 504
//!     → response body dropped     (connection -1)
//! ```
//!
//! A failed forward is not retried on another backend and does not demote
//! the backend; membership only changes through the health monitors.
//!
//! `timeouts.upstream_secs` bounds the wait for response headers only. Once
//! headers arrive the body streams without a deadline, and a backend that
//! stalls mid-body stays counted until the client drops the response.

use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use axum::body::Body;
use axum::http::{Request, Response};
use hyper::body::Incoming;
use thiserror::Error;
use tokio::time;

use crate::config::ProxyConfig;
use crate::http::client::{build_client, UpstreamClient};
use crate::http::request::{prepare_upstream_request, X_REQUEST_ID};
use crate::http::response::into_client_response;
use crate::load_balancer::{Backend, LoadBalancer, ServerPool};
use crate::observability::metrics;

/// Why a request could not be served by a backend.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No healthy backend exists. Terminal, not retried.
    #[error("no healthy backend available")]
    NoBackend,

    #[error("could not build upstream request: {0}")]
    InvalidUpstream(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("upstream timed out after {0:?}")]
    UpstreamTimeout(Duration),
}

/// Selects a backend per request and proxies to it.
#[derive(Debug)]
pub struct Dispatcher {
    pool: Arc<ServerPool>,
    balancer: Box<dyn LoadBalancer>,
    client: UpstreamClient,
    upstream_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        pool: Arc<ServerPool>,
        balancer: Box<dyn LoadBalancer>,
        client: UpstreamClient,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            balancer,
            client,
            upstream_timeout,
        }
    }

    pub fn from_config(pool: Arc<ServerPool>, config: &ProxyConfig) -> Self {
        Self::new(
            pool,
            config.balancing.algorithm.build(),
            build_client(Duration::from_secs(config.timeouts.connect_secs)),
            Duration::from_secs(config.timeouts.upstream_secs),
        )
    }

    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    /// Choose a backend from the current healthy snapshot.
    pub fn select(&self) -> Result<Arc<Backend>, DispatchError> {
        let snapshot = self.pool.list_healthy();
        if snapshot.is_empty() {
            return Err(DispatchError::NoBackend);
        }
        self.balancer
            .next_server(&snapshot)
            .ok_or(DispatchError::NoBackend)
    }

    /// Proxy one request to the least-loaded healthy backend.
    pub async fn dispatch(
        &self,
        request: Request<Body>,
        client: Option<SocketAddr>,
    ) -> Result<Response<Body>, DispatchError> {
        let start = Instant::now();
        let method = request.method().to_string();
        let request_id = request
            .headers()
            .get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let backend = match self.select() {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(request_id = %request_id, "No healthy backends");
                metrics::record_request(&method, e.status().as_u16(), "none", start);
                return Err(e);
            }
        };

        let guard = backend.acquire();
        tracing::debug!(
            request_id = %request_id,
            method = %method,
            path = %request.uri().path(),
            backend = %backend.addr(),
            connections = backend.connections(),
            "Proxying request"
        );

        let result = self.forward(request, backend.addr(), client).await;
        match &result {
            Ok(response) => {
                metrics::record_request(&method, response.status().as_u16(), backend.addr(), start);
            }
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    backend = %backend.addr(),
                    error = %e,
                    "Upstream error"
                );
                metrics::record_request(&method, e.status().as_u16(), backend.addr(), start);
            }
        }

        // On error the guard drops here; on success it rides along with the body.
        result.map(|response| into_client_response(response, guard))
    }

    async fn forward(
        &self,
        request: Request<Body>,
        addr: &str,
        client: Option<SocketAddr>,
    ) -> Result<Response<Incoming>, DispatchError> {
        let upstream = prepare_upstream_request(request, addr, client)
            .map_err(|e| DispatchError::InvalidUpstream(e.to_string()))?;

        match time::timeout(self.upstream_timeout, self.client.request(upstream)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(DispatchError::Upstream(error_chain(&e))),
            Err(_) => Err(DispatchError::UpstreamTimeout(self.upstream_timeout)),
        }
    }
}

/// Render an error with its sources, e.g. `client error (Connect): tcp connect error: ...`.
fn error_chain(err: &dyn StdError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(e) = source {
        out.push_str(": ");
        out.push_str(&e.to_string());
        source = e.source();
    }
    out
}
