//! Prometheus metrics

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};

/// Install the Prometheus exporter and register metric descriptions
///
/// Metrics are served on `/metrics` at the given port.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;

    describe_counter!(
        "gexflow_signals_total",
        "Raw signals received by the pipeline"
    );
    describe_counter!(
        "gexflow_signals_failed_total",
        "Signals that failed a pipeline stage, labeled by stage"
    );
    describe_counter!(
        "gexflow_entries_total",
        "Positions opened from accepted entry decisions"
    );
    describe_counter!(
        "gexflow_entries_rejected_total",
        "Entry decisions rejected by the orchestrator"
    );
    describe_gauge!("gexflow_open_positions", "Currently open positions");
    describe_histogram!(
        "gexflow_pipeline_duration_seconds",
        "End-to-end pipeline latency per signal"
    );

    tracing::info!(port, "Prometheus exporter listening");
    Ok(())
}
