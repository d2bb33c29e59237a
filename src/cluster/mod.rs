//! # Owning System
//!
//! The system that owns live credentials. The reconciler reads the live record through
//! [`SecretStore::get`] and restores a backup through [`SecretStore::create`].
//!
//! Two stores are provided:
//! - [`FileSecretStore`]: one JSON manifest per secret under a root directory
//! - [`MemorySecretStore`]: an in-process map with call recording for tests

pub mod filesystem;
pub mod memory;

pub use filesystem::FileSecretStore;
pub use memory::MemorySecretStore;

use crate::credential::{CredentialRecord, Identity, IdentityParseError};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClusterError>;

/// Errors returned by a [`SecretStore`].
#[derive(Debug, Error)]
pub enum ClusterError {
    /// A live secret already exists under this identity.
    #[error("Secret {identity} already exists")]
    AlreadyExists { identity: Identity },

    #[error("I/O error for secret {identity}: {source}")]
    Io {
        identity: Identity,
        #[source]
        source: std::io::Error,
    },

    /// The stored manifest is not a valid secret.
    #[error("Malformed manifest for secret {identity}: {source}")]
    Malformed {
        identity: Identity,
        #[source]
        source: serde_json::Error,
    },

    /// The record's metadata does not name a valid identity.
    #[error("Secret manifest has an invalid identity: {0}")]
    InvalidIdentity(#[from] IdentityParseError),

    #[error("Cluster API error: {message}")]
    Api { message: String },
}

impl ClusterError {
    pub fn already_exists(identity: Identity) -> Self {
        Self::AlreadyExists { identity }
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::Api { message: message.into() }
    }

    /// True when a create lost a race with another writer.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Lookup and creation of live secrets.
#[async_trait]
pub trait SecretStore: Send + Sync + fmt::Debug {
    /// Fetch the live secret, `None` if it does not exist.
    async fn get(&self, identity: &Identity) -> Result<Option<CredentialRecord>>;

    /// Create a secret that must not already exist.
    ///
    /// Returns [`ClusterError::AlreadyExists`] when it does.
    async fn create(&self, record: &CredentialRecord) -> Result<()>;
}
