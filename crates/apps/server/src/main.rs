use std::sync::Arc;
use std::time::Duration;

use streaming::HttpFetcher;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod proxy;

use config::ProxyConfig;
use proxy::{router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ProxyConfig::from_env();
    let fetcher = HttpFetcher::with_timeout(Duration::from_secs(config.upstream_timeout_s))?;
    let addr = config.addr;

    info!(
        allowed_hosts = ?config.allowed_hosts,
        upstream_timeout_s = config.upstream_timeout_s,
        "proxy configured"
    );
    let app = router(AppState::new(Arc::new(fetcher), config));

    info!("parts proxy listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
