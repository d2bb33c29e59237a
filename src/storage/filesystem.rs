//! Filesystem storage backend
//!
//! Stores each object as a file named after its key inside one directory. Uploads are written
//! to a hidden temporary file, synced, then renamed over the target, so readers only ever see a
//! complete object.

use super::{Result, StorageBackend, StorageBackendType, StorageError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    root: PathBuf,
}

impl FilesystemStorage {
    /// Use `root` as the storage directory; it must already exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Use `root` as the storage directory, creating it if needed.
    pub async fn create(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)
            .await
            .map_err(|e| StorageError::io(root.display().to_string(), e))?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() {
            return Err(StorageError::invalid_key(name, "key is empty"));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(StorageError::invalid_key(name, "key must not contain path separators"));
        }
        if name.starts_with('.') {
            return Err(StorageError::invalid_key(name, "key must not start with '.'"));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl StorageBackend for FilesystemStorage {
    async fn upload(&self, name: &str, content: Vec<u8>) -> Result<()> {
        let target = self.object_path(name)?;
        let staging = self.root.join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()));

        let write = async {
            let mut file = fs::File::create(&staging).await?;
            file.write_all(&content).await?;
            file.sync_all().await?;
            fs::rename(&staging, &target).await
        };

        if let Err(e) = write.await {
            let _ = fs::remove_file(&staging).await;
            return Err(StorageError::io(name, e));
        }

        debug!(key = %name, path = %target.display(), bytes = content.len(), "Wrote backup object");
        Ok(())
    }

    async fn download(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.object_path(name)?;
        match fs::read(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::not_found(name)),
            Err(e) => Err(StorageError::io(name, e)),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let root = self.root.display().to_string();
        let mut entries = fs::read_dir(&self.root).await.map_err(|e| StorageError::io(&root, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| StorageError::io(&root, e))? {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if let Some(name) = entry.file_name().to_str() {
                if is_file && !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn backend_type(&self) -> StorageBackendType {
        StorageBackendType::Filesystem
    }
}
