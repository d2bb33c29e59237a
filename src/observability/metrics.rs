//! # Metrics Collection
//!
//! Prometheus metrics for reconcile activity. Recording goes through the `metrics` facade and is
//! a no-op until [`init_metrics`] installs the exporter.

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

/// Metrics recorder for reconcile and storage activity
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Record one finished reconcile. `outcome` is the outcome name, or `retry` / `terminal`
    /// for failures.
    pub fn record_reconcile(&self, outcome: &str, duration: f64) {
        let labels = [("outcome", outcome.to_string())];
        counter!("cert_backup_reconcile_total", &labels).increment(1);
        histogram!("cert_backup_reconcile_duration_seconds").record(duration);
    }

    /// Record a storage call made by the reconciler.
    pub fn record_storage_operation(&self, operation: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        let labels = [("operation", operation.to_string()), ("status", status.to_string())];
        counter!("cert_backup_storage_operations_total", &labels).increment(1);
    }

    fn register_metrics(&self) {
        describe_counter!(
            "cert_backup_reconcile_total",
            Unit::Count,
            "Reconcile runs by outcome"
        );
        describe_histogram!(
            "cert_backup_reconcile_duration_seconds",
            Unit::Seconds,
            "Wall time of one reconcile run"
        );
        describe_counter!(
            "cert_backup_storage_operations_total",
            Unit::Count,
            "Backup storage calls by operation and status"
        );
    }
}

/// Install the Prometheus exporter when a metrics address is configured.
///
/// Must be called from within a Tokio runtime.
pub async fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    let Some(addr) = config.metrics_addr else {
        return Ok(());
    };

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", &config.service_name)
        .install()
        .map_err(|e| Error::observability(format!("Failed to initialize metrics exporter: {}", e)))?;

    MetricsRecorder::new().register_metrics();

    info!(metrics_addr = %addr, "Metrics collection initialized");
    Ok(())
}
