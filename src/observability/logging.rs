//! # Structured Logging
//!
//! Subscriber setup and span helpers. Every reconcile runs inside a `reconcile_span!` so log
//! lines from storage and cluster calls carry the identity and a per-run `operation_id`.

use crate::config::{Config, LogFormat, ObservabilityConfig};
use crate::errors::{Error, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Create a tracing span for one reconcile of an identity.
///
/// ```rust,ignore
/// let span = reconcile_span!(identity);
/// let span = reconcile_span!(identity, trigger = "resync");
/// ```
#[macro_export]
macro_rules! reconcile_span {
    ($identity:expr) => {
        tracing::info_span!(
            "reconcile",
            secret = %$identity,
            operation_id = %uuid::Uuid::new_v4(),
            outcome = tracing::field::Empty
        )
    };
    ($identity:expr, $($field:tt)*) => {
        tracing::info_span!(
            "reconcile",
            secret = %$identity,
            operation_id = %uuid::Uuid::new_v4(),
            outcome = tracing::field::Empty,
            $($field)*
        )
    };
}

/// Install the global subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `config.log_level`. Fails if a global
/// subscriber is already set.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| Error::observability(format!("Invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    installed.map_err(|e| Error::observability(format!("Failed to install subscriber: {}", e)))
}

/// Log configuration at startup
pub fn log_config_info(config: &Config) {
    tracing::info!(
        storage = %config.storage.backend,
        secrets_dir = %config.secrets_dir.display(),
        identities = config.identities.len(),
        resync_secs = config.scheduler.resync_interval.as_secs(),
        on_unverifiable_live = %config.live_policy,
        metrics_addr = ?config.observability.metrics_addr,
        "cert-backup configuration"
    );
}
