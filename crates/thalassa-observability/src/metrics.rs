use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::warn;

/// Install the recorder without an HTTP listener (batch runs scrape
/// nothing; the recorder still keeps counters consistent).
pub fn init_prometheus_exporter() {
    if let Err(e) = PrometheusBuilder::new().install_recorder() {
        warn!("prometheus recorder not installed: {}", e);
    }
}

/// Install the recorder with an HTTP listener for long-lived runs.
pub fn start_metrics_server(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    Ok(())
}
