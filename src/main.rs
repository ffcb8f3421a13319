use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port = std::env::var("ZONEGATE_HTTP_PORT").unwrap_or_else(|_| "7878".to_string());
    let monitor_secs = std::env::var("ZONEGATE_MONITOR_INTERVAL_SECS").unwrap_or_else(|_| "30".to_string());
    let sweep_secs = std::env::var("ZONEGATE_SWEEP_INTERVAL_SECS").unwrap_or_else(|_| "60".to_string());
    info!(
        target: "zonegate",
        "zonegate starting: RUST_LOG='{}', http_port={}, monitor_interval_secs={}, sweep_interval_secs={}",
        rust_log, http_port, monitor_secs, sweep_secs
    );

    zonegate::server::run().await
}
