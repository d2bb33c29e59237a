//! In-memory secret store for tests.

use super::{ClusterError, Result, SecretStore};
use crate::credential::{CredentialRecord, Identity};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Secret store backed by a shared map.
///
/// Created secrets get a fresh `resourceVersion` and `uid`, like a real API server, and every
/// record passed to `create` is kept for inspection.
#[derive(Debug, Default, Clone)]
pub struct MemorySecretStore {
    secrets: Arc<RwLock<HashMap<Identity, CredentialRecord>>>,
    created: Arc<RwLock<Vec<CredentialRecord>>>,
    next_version: Arc<AtomicU64>,
    fail_next_get: Arc<Mutex<Option<String>>>,
    fail_next_create: Arc<Mutex<Option<String>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a secret directly, replacing any existing one.
    pub async fn insert(&self, record: CredentialRecord) -> Result<()> {
        let identity = record.identity()?;
        self.secrets.write().await.insert(identity, record);
        Ok(())
    }

    pub async fn remove(&self, identity: &Identity) -> Option<CredentialRecord> {
        self.secrets.write().await.remove(identity)
    }

    /// Records passed to `create`, in call order, as they were received.
    pub async fn created(&self) -> Vec<CredentialRecord> {
        self.created.read().await.clone()
    }

    pub async fn create_count(&self) -> usize {
        self.created.read().await.len()
    }

    pub async fn fail_next_get(&self, message: impl Into<String>) {
        *self.fail_next_get.lock().await = Some(message.into());
    }

    pub async fn fail_next_create(&self, message: impl Into<String>) {
        *self.fail_next_create.lock().await = Some(message.into());
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, identity: &Identity) -> Result<Option<CredentialRecord>> {
        if let Some(message) = self.fail_next_get.lock().await.take() {
            return Err(ClusterError::api(message));
        }
        Ok(self.secrets.read().await.get(identity).cloned())
    }

    async fn create(&self, record: &CredentialRecord) -> Result<()> {
        self.created.write().await.push(record.clone());
        if let Some(message) = self.fail_next_create.lock().await.take() {
            return Err(ClusterError::api(message));
        }

        let identity = record.identity()?;
        let mut secrets = self.secrets.write().await;
        if secrets.contains_key(&identity) {
            return Err(ClusterError::already_exists(identity));
        }

        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        let mut stored = record.clone();
        stored.metadata.resource_version = Some(version.to_string());
        stored.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        secrets.insert(identity, stored);
        Ok(())
    }
}
