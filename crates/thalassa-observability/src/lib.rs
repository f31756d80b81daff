pub mod metrics;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the tracing registry (EnvFilter + JSON fmt) and the
/// Prometheus recorder. Call once from a binary's main.
pub fn init_observability() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    metrics::init_prometheus_exporter();
}
