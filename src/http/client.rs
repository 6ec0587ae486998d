//! Outbound HTTP client shared by the dispatcher and the prober.

use std::time::Duration;
use axum::body::Body;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

/// Client type used for every upstream call.
pub type UpstreamClient = Client<HttpConnector, Body>;

/// Build a pooled HTTP/1.1 client with a bounded connect phase.
pub fn build_client(connect_timeout: Duration) -> UpstreamClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    connector.set_nodelay(true);

    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build(connector)
}
