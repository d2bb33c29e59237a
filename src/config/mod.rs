//! # Configuration Management
//!
//! Runtime configuration read from environment variables (after `.env` loading in the binary).
//!
//! | Variable | Default |
//! |---|---|
//! | `CERT_BACKUP_STORAGE` | `filesystem` (`filesystem`, `s3`, `memory`) |
//! | `CERT_BACKUP_STORAGE_DIR` | `./backups` |
//! | `CERT_BACKUP_S3_BUCKET` / `S3_BUCKET` | unset |
//! | `CERT_BACKUP_S3_REGION` / `S3_REGION` | unset |
//! | `CERT_BACKUP_S3_PREFIX` | unset |
//! | `CERT_BACKUP_SECRETS_DIR` | `./secrets` |
//! | `CERT_BACKUP_IDENTITIES` | empty, comma separated `namespace/name` |
//! | `CERT_BACKUP_RESYNC_SECS` | `300` |
//! | `CERT_BACKUP_ON_UNVERIFIABLE_LIVE` | `restore` (`restore`, `halt`) |
//! | `CERT_BACKUP_LOG_FORMAT` | `text` (`text`, `json`) |
//! | `CERT_BACKUP_LOG_LEVEL` | `info`, overridden by `RUST_LOG` |
//! | `CERT_BACKUP_METRICS_ADDR` | unset, e.g. `0.0.0.0:9090` |

use crate::credential::Identity;
use crate::errors::{Error, Result};
use crate::reconcile::LiveValidationPolicy;
use crate::scheduler::RetryConfig;
use crate::storage::{S3Config, StorageBackendType};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_RESYNC_SECS: u64 = 300;

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    /// Root of the manifest directory used by the file secret store.
    pub secrets_dir: PathBuf,
    /// Identities reconciled by the `run` loop.
    pub identities: Vec<Identity>,
    pub live_policy: LiveValidationPolicy,
    pub scheduler: LoopConfig,
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            secrets_dir: PathBuf::from("./secrets"),
            identities: Vec::new(),
            live_policy: LiveValidationPolicy::default(),
            scheduler: LoopConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Backup storage selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackendType,
    /// Directory for the filesystem backend.
    pub directory: PathBuf,
    /// Bucket settings, present when both bucket and region are configured.
    pub s3: Option<S3Config>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendType::Filesystem,
            directory: PathBuf::from("./backups"),
            s3: None,
        }
    }
}

/// Reconcile loop timing.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// Delay after a successful or terminally failed reconcile.
    pub resync_interval: Duration,
    /// Backoff after retryable failures.
    pub retry: RetryConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            resync_interval: Duration::from_secs(DEFAULT_RESYNC_SECS),
            retry: RetryConfig::default(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("Unknown log format: {}", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Logging and metrics settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub log_level: String,
    pub log_format: LogFormat,
    /// Prometheus listener address; metrics are not exported when unset.
    pub metrics_addr: Option<SocketAddr>,
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_addr: None,
            service_name: crate::APP_NAME.to_string(),
        }
    }
}

impl Config {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let backend = match var("CERT_BACKUP_STORAGE") {
            Some(value) => value.parse::<StorageBackendType>().map_err(Error::config)?,
            None => defaults.storage.backend,
        };

        let bucket = var("CERT_BACKUP_S3_BUCKET").or_else(|| var("S3_BUCKET"));
        let region = var("CERT_BACKUP_S3_REGION").or_else(|| var("S3_REGION"));
        let s3 = match (bucket, region) {
            (Some(bucket), Some(region)) => Some(
                S3Config::new(bucket, region)
                    .with_prefix(var("CERT_BACKUP_S3_PREFIX").unwrap_or_default()),
            ),
            _ => None,
        };

        let storage = StorageConfig {
            backend,
            directory: var("CERT_BACKUP_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage.directory),
            s3,
        };

        let identities = match var("CERT_BACKUP_IDENTITIES") {
            Some(list) => parse_identities(&list)?,
            None => Vec::new(),
        };

        let resync_interval = match var("CERT_BACKUP_RESYNC_SECS") {
            Some(secs) => Duration::from_secs(secs.parse::<u64>().map_err(|e| {
                Error::config(format!("Invalid CERT_BACKUP_RESYNC_SECS '{}': {}", secs, e))
            })?),
            None => defaults.scheduler.resync_interval,
        };

        let live_policy = match var("CERT_BACKUP_ON_UNVERIFIABLE_LIVE") {
            Some(value) => value.parse::<LiveValidationPolicy>().map_err(Error::config)?,
            None => defaults.live_policy,
        };

        let log_format = match var("CERT_BACKUP_LOG_FORMAT") {
            Some(value) => value.parse::<LogFormat>().map_err(Error::config)?,
            None => LogFormat::default(),
        };

        let metrics_addr = match var("CERT_BACKUP_METRICS_ADDR") {
            Some(addr) => Some(addr.parse::<SocketAddr>().map_err(|e| {
                Error::config(format!("Invalid metrics bind address '{}': {}", addr, e))
            })?),
            None => None,
        };

        let config = Self {
            storage,
            secrets_dir: var("CERT_BACKUP_SECRETS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.secrets_dir),
            identities,
            live_policy,
            scheduler: LoopConfig { resync_interval, retry: defaults.scheduler.retry },
            observability: ObservabilityConfig {
                log_level: var("CERT_BACKUP_LOG_LEVEL")
                    .unwrap_or(defaults.observability.log_level),
                log_format,
                metrics_addr,
                service_name: defaults.observability.service_name,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot work together.
    pub fn validate(&self) -> Result<()> {
        if self.storage.backend == StorageBackendType::S3 && self.storage.s3.is_none() {
            return Err(Error::config(
                "S3 storage requires CERT_BACKUP_S3_BUCKET and CERT_BACKUP_S3_REGION",
            ));
        }
        if self.scheduler.resync_interval.is_zero() {
            return Err(Error::config("CERT_BACKUP_RESYNC_SECS must be greater than zero"));
        }
        Ok(())
    }
}

fn parse_identities(list: &str) -> Result<Vec<Identity>> {
    let mut identities = Vec::new();
    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let identity = entry
            .parse::<Identity>()
            .map_err(|e| Error::config(e.to_string()))?;
        if !identities.contains(&identity) {
            identities.push(identity);
        }
    }
    Ok(identities)
}
