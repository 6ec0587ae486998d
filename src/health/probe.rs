//! Single-backend health probe.
//!
//! A probe is `GET http://<addr><path>`. Only a 200 within the deadline counts
//! as healthy; any other status, a connection error or a timeout is a failure.

use std::time::Duration;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::http::client::{build_client, UpstreamClient};
use crate::load_balancer::Backend;

/// Result of probing one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy,
    BadStatus(StatusCode),
    Failed(String),
    TimedOut,
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Healthy)
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ProbeOutcome::Healthy => "healthy",
            ProbeOutcome::BadStatus(_) => "bad_status",
            ProbeOutcome::Failed(_) => "error",
            ProbeOutcome::TimedOut => "timeout",
        }
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeOutcome::Healthy => write!(f, "healthy"),
            ProbeOutcome::BadStatus(s) => write!(f, "non-200 status {}", s),
            ProbeOutcome::Failed(e) => write!(f, "connection error: {}", e),
            ProbeOutcome::TimedOut => write!(f, "timeout"),
        }
    }
}

/// Issues health probes. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct Prober {
    client: UpstreamClient,
    path: String,
    timeout: Duration,
}

impl Prober {
    pub fn new(config: &HealthCheckConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        Self::with_timeout(&config.path, timeout)
    }

    /// Build a prober with an explicit deadline.
    pub fn with_timeout(path: &str, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            path: path.to_string(),
            timeout,
        }
    }

    pub async fn probe(&self, backend: &Backend) -> ProbeOutcome {
        let uri = format!("http://{}{}", backend.addr(), self.path);
        let request = match Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::USER_AGENT, "pool-balancer-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => return ProbeOutcome::Failed(e.to_string()),
        };

        match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status() == StatusCode::OK => ProbeOutcome::Healthy,
            Ok(Ok(response)) => ProbeOutcome::BadStatus(response.status()),
            Ok(Err(e)) => ProbeOutcome::Failed(e.to_string()),
            Err(_) => ProbeOutcome::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert!(ProbeOutcome::Healthy.is_healthy());
        assert!(!ProbeOutcome::BadStatus(StatusCode::NO_CONTENT).is_healthy());
        assert!(!ProbeOutcome::TimedOut.is_healthy());
        assert_eq!(ProbeOutcome::Failed("refused".into()).label(), "error");
        assert_eq!(
            ProbeOutcome::BadStatus(StatusCode::INTERNAL_SERVER_ERROR).to_string(),
            "non-200 status 500 Internal Server Error"
        );
    }

    #[tokio::test]
    async fn test_probe_refused_connection() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = Prober::with_timeout("/", Duration::from_secs(1));
        let outcome = prober.probe(&Backend::new(addr.to_string())).await;
        assert!(!outcome.is_healthy(), "{:?}", outcome);
    }
}
