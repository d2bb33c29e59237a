//! # Error Handling
//!
//! Top-level error type used while bootstrapping the backup service: configuration loading,
//! logging and metrics setup, and backend construction. Reconciliation failures carry their
//! own taxonomy in [`crate::reconcile::ReconcileError`].

use crate::storage::StorageError;

/// Custom result type for cert-backup bootstrap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the cert-backup service
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Observability setup errors (logging, metrics exporter)
    #[error("Observability error: {0}")]
    Observability(String),

    /// Storage backend construction errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new observability error
    pub fn observability<S: Into<String>>(message: S) -> Self {
        Self::Observability(message.into())
    }
}
