//! Amazon S3 storage backend
//!
//! Objects live at `<prefix><name>` in a single bucket. Credentials come from the standard AWS
//! provider chain (environment, profile, instance metadata).

/// Bucket location for the S3 backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Prepended to every object key, e.g. `"cert-backups/"`.
    pub prefix: Option<String>,
}

impl S3Config {
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), region: region.into(), prefix: None }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    /// Full object key for a backup name.
    pub fn object_key(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, name),
            None => name.to_string(),
        }
    }

    /// Backup name for a full object key, or `None` if it lies outside the prefix.
    pub fn backup_name<'a>(&self, object_key: &'a str) -> Option<&'a str> {
        match &self.prefix {
            Some(prefix) => object_key.strip_prefix(prefix.as_str()),
            None => Some(object_key),
        }
        .filter(|name| !name.is_empty())
    }
}

#[cfg(feature = "aws")]
pub use client::S3Storage;

#[cfg(feature = "aws")]
mod client {
    use super::S3Config;
    use crate::storage::{Result, StorageBackend, StorageBackendType, StorageError};
    use async_trait::async_trait;
    use aws_config::Region;
    use aws_sdk_s3::error::DisplayErrorContext;
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::Client;
    use tracing::debug;

    #[derive(Debug, Clone)]
    pub struct S3Storage {
        client: Client,
        config: S3Config,
    }

    impl S3Storage {
        /// Load AWS credentials and build a client for `config.region`.
        pub async fn new(config: S3Config) -> Self {
            let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(Region::new(config.region.clone()))
                .load()
                .await;

            Self::with_client(Client::new(&sdk_config), config)
        }

        pub fn with_client(client: Client, config: S3Config) -> Self {
            Self { client, config }
        }
    }

    #[async_trait]
    impl StorageBackend for S3Storage {
        async fn upload(&self, name: &str, content: Vec<u8>) -> Result<()> {
            let key = self.config.object_key(name);
            let bytes = content.len();

            self.client
                .put_object()
                .bucket(&self.config.bucket)
                .key(&key)
                .content_type("application/json")
                .body(ByteStream::from(content))
                .send()
                .await
                .map_err(|e| {
                    StorageError::backend(format!("PutObject {}: {}", key, DisplayErrorContext(&e)))
                })?;

            debug!(bucket = %self.config.bucket, key = %key, bytes, "Uploaded backup object");
            Ok(())
        }

        async fn download(&self, name: &str) -> Result<Vec<u8>> {
            let key = self.config.object_key(name);

            let output = match self
                .client
                .get_object()
                .bucket(&self.config.bucket)
                .key(&key)
                .send()
                .await
            {
                Ok(output) => output,
                Err(e) => {
                    let missing =
                        e.as_service_error().map(|se| se.is_no_such_key()).unwrap_or(false);
                    if missing {
                        return Err(StorageError::not_found(name));
                    }
                    return Err(StorageError::backend(format!(
                        "GetObject {}: {}",
                        key,
                        DisplayErrorContext(&e)
                    )));
                }
            };

            let body = output.body.collect().await.map_err(|e| {
                StorageError::backend(format!("reading body of {}: {}", key, e))
            })?;
            Ok(body.into_bytes().to_vec())
        }

        async fn list(&self) -> Result<Vec<String>> {
            let mut names = Vec::new();
            let mut continuation: Option<String> = None;

            loop {
                let mut request = self.client.list_objects_v2().bucket(&self.config.bucket);
                if let Some(prefix) = &self.config.prefix {
                    request = request.prefix(prefix);
                }
                if let Some(token) = continuation.take() {
                    request = request.continuation_token(token);
                }

                let page = request.send().await.map_err(|e| {
                    StorageError::backend(format!(
                        "ListObjectsV2 {}: {}",
                        self.config.bucket,
                        DisplayErrorContext(&e)
                    ))
                })?;

                for object in page.contents() {
                    if let Some(name) = object.key().and_then(|k| self.config.backup_name(k)) {
                        names.push(name.to_string());
                    }
                }

                match page.next_continuation_token() {
                    Some(token) if page.is_truncated().unwrap_or(false) => {
                        continuation = Some(token.to_string());
                    }
                    _ => break,
                }
            }

            names.sort();
            Ok(names)
        }

        fn backend_type(&self) -> StorageBackendType {
            StorageBackendType::S3
        }
    }
}
