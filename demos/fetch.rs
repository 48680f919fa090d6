//! Fetches a URL twice through a persistent cache and reports where each
//! response came from.
//!
//! ```text
//! RUST_LOG=rttp_cache=debug cargo run --example fetch -- http://example.com/ ./http-cache
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use rttp_cache::cache::{CachingTransport, FileBackend, FixedTtl, TelemetryCounters};
use rttp_cache::http::Request;
use rttp_cache::transport::{TcpTransport, Transport};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| "http://example.com/".to_owned());
    let dir = args.next().unwrap_or_else(|| "./http-cache".to_owned());

    let counters = Arc::new(TelemetryCounters::new());
    let origin = TcpTransport::new().with_timeout(Duration::from_secs(10));
    let client = CachingTransport::builder(origin)
        .backend(FileBackend::create(&dir).await?)
        .policy(FixedTtl::new(Duration::from_secs(300)))
        .telemetry(counters.clone())
        .build();

    for attempt in 1..=2 {
        let started = Instant::now();
        let response = client.send(Request::get(&url)?).await?;
        let status = response.status();
        let body = response.into_body().bytes().await?;
        tracing::info!(attempt, %status, bytes = body.len(), elapsed = ?started.elapsed(), "fetched");
    }

    tracing::info!(hits = counters.hits(), misses = counters.misses(), "done");
    Ok(())
}
