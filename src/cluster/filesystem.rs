//! Directory-backed secret store.
//!
//! Each secret is a JSON manifest at `<root>/<namespace>/<name>.json`, the same format as a
//! backup object. Creation uses create-new semantics, so a second create for the same identity
//! fails with [`ClusterError::AlreadyExists`].

use super::{ClusterError, Result, SecretStore};
use crate::credential::{CredentialRecord, Identity};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FileSecretStore {
    root: PathBuf,
}

impl FileSecretStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Manifest path for `identity`.
    ///
    /// Both path components must be plain file names, so the path always stays under the root.
    pub fn manifest_path(&self, identity: &Identity) -> Result<PathBuf> {
        let file_name = format!("{}.json", identity.name());
        for component in [identity.namespace(), file_name.as_str()] {
            if !is_plain_file_name(component) {
                return Err(ClusterError::Io {
                    identity: identity.clone(),
                    source: std::io::Error::new(
                        ErrorKind::InvalidInput,
                        format!("'{}' is not a plain file name", component),
                    ),
                });
            }
        }
        Ok(self.root.join(identity.namespace()).join(file_name))
    }
}

fn is_plain_file_name(component: &str) -> bool {
    let mut components = Path::new(component).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == component
    )
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get(&self, identity: &Identity) -> Result<Option<CredentialRecord>> {
        let path = self.manifest_path(identity)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ClusterError::Io { identity: identity.clone(), source }),
        };

        let record = CredentialRecord::from_bytes(&bytes)
            .map_err(|source| ClusterError::Malformed { identity: identity.clone(), source })?;
        Ok(Some(record))
    }

    async fn create(&self, record: &CredentialRecord) -> Result<()> {
        let identity = record.identity()?;
        let path = self.manifest_path(&identity)?;
        let io_err = |source| ClusterError::Io { identity: identity.clone(), source };

        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|source| ClusterError::Malformed { identity: identity.clone(), source })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ClusterError::already_exists(identity.clone()));
            }
            Err(e) => return Err(io_err(e)),
        };
        file.write_all(&bytes).await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;

        debug!(secret = %identity, path = %path.display(), "Created secret manifest");
        Ok(())
    }
}
