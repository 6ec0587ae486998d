//! A tiny backend to put behind the balancer.
//!
//! ```text
//! cargo run --example mock_backend -- --port 8081 --name one
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use axum::{extract::State, routing::get, Router};
use clap::Parser;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short, long, default_value_t = 8081)]
    port: u16,

    /// Label printed with every hit.
    #[arg(short, long, default_value = "backend")]
    name: String,
}

#[derive(Clone)]
struct Hits {
    name: Arc<str>,
    count: Arc<AtomicU64>,
}

async fn hello(State(hits): State<Hits>) -> &'static str {
    let n = hits.count.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::info!(name = %hits.name, hits = n, "Request served");
    "hi\n"
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let hits = Hits {
        name: args.name.into(),
        count: Arc::new(AtomicU64::new(0)),
    };
    let app = Router::new().route("/", get(hello)).with_state(hits);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Mock backend listening");
    axum::serve(listener, app).await?;
    Ok(())
}
