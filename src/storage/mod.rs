//! # Backup Storage
//!
//! Durable key/value object storage for credential backups. The reconciler depends only on the
//! [`StorageBackend`] trait; concrete backends are chosen at startup from configuration.
//!
//! ## Supported Backends
//!
//! - **Filesystem**: one file per object in a local directory
//! - **S3**: one object per key in an S3 bucket (`aws` feature)
//! - **Memory**: process-local map, for tests and dry runs
//!
//! ## Contract
//!
//! - `upload` overwrites any existing object under the same name; `Ok` means the write is durable
//! - `download` reports a missing object as [`StorageError::NotFound`], distinct from every
//!   other failure
//! - distinct names never interfere with each other, so callers need no cross-key locking

pub mod filesystem;
pub mod memory;
pub mod s3;

pub use filesystem::FilesystemStorage;
pub use memory::MemoryStorage;
pub use s3::S3Config;
#[cfg(feature = "aws")]
pub use s3::S3Storage;

use crate::config::StorageConfig;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors returned by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No object is stored under the key.
    #[error("Object not found: {key}")]
    NotFound { key: String },

    /// The key cannot be used with this backend.
    #[error("Invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Local I/O failure.
    #[error("I/O error for object '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Remote backend failure (network, permissions, throttling).
    #[error("Backend error: {message}")]
    Backend { message: String },

    /// The backend is misconfigured or unavailable in this build.
    #[error("Storage configuration error: {message}")]
    Config { message: String },
}

impl StorageError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey { key: key.into(), reason: reason.into() }
    }

    pub fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { key: key.into(), source }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// True when the object simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Type of storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageBackendType {
    /// Local directory
    Filesystem,
    /// Amazon S3 bucket
    S3,
    /// Process memory
    Memory,
}

impl StorageBackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::S3 => "s3",
            Self::Memory => "memory",
        }
    }
}

impl FromStr for StorageBackendType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "filesystem" | "fs" => Ok(Self::Filesystem),
            "s3" => Ok(Self::S3),
            "memory" => Ok(Self::Memory),
            other => Err(format!("Unknown storage backend: {}", other)),
        }
    }
}

impl fmt::Display for StorageBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable object store holding one backup object per key.
///
/// Implementations must be Send + Sync for use across reconcile tasks.
#[async_trait]
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Store `content` under `name`, replacing any existing object.
    async fn upload(&self, name: &str, content: Vec<u8>) -> Result<()>;

    /// Fetch the object stored under `name`.
    ///
    /// Returns [`StorageError::NotFound`] when nothing is stored there.
    async fn download(&self, name: &str) -> Result<Vec<u8>>;

    /// Names of all stored objects, sorted.
    async fn list(&self) -> Result<Vec<String>>;

    fn backend_type(&self) -> StorageBackendType;
}

/// Build the backend selected by `config`.
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config.backend {
        StorageBackendType::Filesystem => {
            Arc::new(FilesystemStorage::create(&config.directory).await?)
        }
        StorageBackendType::Memory => Arc::new(MemoryStorage::new()),
        StorageBackendType::S3 => build_s3(config).await?,
    };

    info!(backend = %backend.backend_type(), "Initialized backup storage");
    Ok(backend)
}

#[cfg(feature = "aws")]
async fn build_s3(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    let s3 = config
        .s3
        .clone()
        .ok_or_else(|| StorageError::config("S3 storage selected but bucket/region are not set"))?;
    Ok(Arc::new(S3Storage::new(s3).await))
}

#[cfg(not(feature = "aws"))]
async fn build_s3(_config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    Err(StorageError::config("S3 storage requires building with the 'aws' feature"))
}
