//! # Observability Infrastructure
//!
//! Structured logging through `tracing` and Prometheus metrics through `metrics`.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, log_config_info};
pub use metrics::{init_metrics, MetricsRecorder};

use crate::config::ObservabilityConfig;
use crate::errors::Result;
use ::tracing::info;

/// Initialize logging, then metrics if an exporter address is configured.
pub async fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    init_logging(config)?;
    init_metrics(config).await?;

    info!(
        service_name = %config.service_name,
        log_level = %config.log_level,
        log_format = %config.log_format,
        metrics_enabled = config.metrics_addr.is_some(),
        "Observability initialized"
    );
    Ok(())
}
