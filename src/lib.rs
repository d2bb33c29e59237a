//! # cert-backup
//!
//! Keeps TLS credentials (an RSA private key and its certificate chain) backed up to durable
//! storage and restores them when the live credential disappears or stops being valid.
//!
//! ## Architecture
//!
//! ```text
//! ReconcileLoop → Reconciler → CredentialValidator
//!                     ↓   ↘
//!              SecretStore   StorageBackend (filesystem | s3 | memory)
//! ```
//!
//! ## Core Components
//!
//! - **Validation**: judges a credential by key type, hostname and validity windows
//! - **Reconciliation**: decides between backing up, restoring, or doing nothing
//! - **Storage**: one backup object per credential, overwritten on each backup
//! - **Scheduler**: periodic reconcile per identity with backoff on transient failures
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cert_backup::{
//!     cluster::FileSecretStore, credential::Identity, storage::FilesystemStorage,
//!     CredentialValidator, Reconciler,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let storage = Arc::new(FilesystemStorage::create("./backups").await?);
//! let secrets = Arc::new(FileSecretStore::new("./secrets"));
//! let reconciler = Reconciler::new(CredentialValidator::default(), storage, secrets);
//!
//! let identity = Identity::new("default", "web-tls")?;
//! let outcome = reconciler.reconcile(&identity, &CancellationToken::new()).await;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod cluster;
pub mod config;
pub mod credential;
pub mod errors;
pub mod observability;
pub mod reconcile;
pub mod scheduler;
pub mod storage;
pub mod validation;

#[cfg(test)]
mod test_support;

// Re-export commonly used types and traits
pub use config::Config;
pub use errors::{Error, Result};
pub use reconcile::{LiveValidationPolicy, ReconcileError, ReconcileOutcome, Reconciler};
pub use scheduler::ReconcileLoop;
pub use validation::{CredentialValidator, ValidationOutcome};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
