//! In-memory storage backend
//!
//! Keeps objects in a shared map. Clones share the same map, so a test can hand one clone to the
//! reconciler and inspect another. Call counters and one-shot failure injection support
//! asserting exactly which storage calls a reconcile made.

use super::{Result, StorageBackend, StorageBackendType, StorageError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    uploads: Arc<AtomicUsize>,
    downloads: Arc<AtomicUsize>,
    fail_next_upload: Arc<Mutex<Option<String>>>,
    fail_next_download: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without counting it as an upload.
    pub async fn insert(&self, name: impl Into<String>, content: Vec<u8>) {
        self.objects.write().await.insert(name.into(), content);
    }

    /// Read an object without counting it as a download.
    pub async fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(name).cloned()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Make the next upload fail with a backend error carrying `message`.
    pub async fn fail_next_upload(&self, message: impl Into<String>) {
        *self.fail_next_upload.lock().await = Some(message.into());
    }

    /// Make the next download fail with a backend error carrying `message`.
    pub async fn fail_next_download(&self, message: impl Into<String>) {
        *self.fail_next_download.lock().await = Some(message.into());
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn upload(&self, name: &str, content: Vec<u8>) -> Result<()> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_next_upload.lock().await.take() {
            return Err(StorageError::backend(message));
        }

        debug!(key = %name, bytes = content.len(), "Storing object in memory");
        self.objects.write().await.insert(name.to_string(), content);
        Ok(())
    }

    async fn download(&self, name: &str) -> Result<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_next_download.lock().await.take() {
            return Err(StorageError::backend(message));
        }

        self.objects.read().await.get(name).cloned().ok_or_else(|| StorageError::not_found(name))
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.objects.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn backend_type(&self) -> StorageBackendType {
        StorageBackendType::Memory
    }
}
