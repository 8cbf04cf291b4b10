//! Telemetry module
//!
//! Structured logging and Prometheus metrics.

mod logging;
mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;

use crate::config::TelemetryConfig;

/// Initialize all telemetry subsystems
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    init_logging(&config.log_level)?;
    init_metrics(config.metrics_port)?;
    Ok(())
}
