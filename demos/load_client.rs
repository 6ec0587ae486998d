//! Polls the balancer in a loop and prints a running tally.
//!
//! ```text
//! cargo run --example load_client -- --url http://127.0.0.1:8080/ --delay-ms 200
//! ```

use std::time::Duration;
use clap::Parser;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short, long, default_value = "http://127.0.0.1:8080/")]
    url: String,

    /// Pause between requests.
    #[arg(short, long, default_value_t = 500)]
    delay_ms: u64,

    /// Stop after this many requests (0 runs forever).
    #[arg(short, long, default_value_t = 0)]
    count: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let client = reqwest::Client::builder().no_proxy().build()?;

    let (mut ok, mut failed) = (0u64, 0u64);
    let mut sent = 0u64;
    while args.count == 0 || sent < args.count {
        sent += 1;
        match client.get(&args.url).send().await {
            Ok(res) if res.status().is_success() => ok += 1,
            Ok(res) => {
                failed += 1;
                eprintln!("status {}", res.status());
            }
            Err(e) => {
                failed += 1;
                eprintln!("request failed: {}", e);
            }
        }
        println!("sent={} ok={} failed={}", sent, ok, failed);
        tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
    }
    Ok(())
}
