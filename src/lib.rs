//! Least-connections HTTP load balancer.
//!
//! A reverse proxy that spreads requests across a dynamic pool of backends,
//! demotes backends that fail health probes and promotes them back once they
//! recover.

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::ServerPool;
