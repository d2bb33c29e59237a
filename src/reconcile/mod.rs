//! # Reconciliation
//!
//! Brings the backup slot and the live secret of one identity into agreement. Each call does
//! exactly one of:
//!
//! - **Back up**: the live secret is valid, so it is uploaded over the existing backup
//! - **Restore**: the live secret is missing or unusable and a valid backup exists, so the backup
//!   is created as the new live secret
//! - **Nothing**: the live secret is unusable and no backup exists
//!
//! Every call is safe to repeat. Errors report through [`ReconcileError::is_retryable`] whether
//! the caller should try again; terminal errors need an operator.

use crate::cluster::{ClusterError, SecretStore};
use crate::credential::{BackupKey, CredentialRecord, Identity};
use crate::observability::MetricsRecorder;
use crate::storage::{StorageBackend, StorageError};
use crate::validation::{CredentialValidator, InvalidReason, ValidationError};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

/// What to do when the live secret cannot be judged at all (malformed PEM, non-RSA key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiveValidationPolicy {
    /// Log the validator error and treat the live secret as untrustworthy.
    #[default]
    AttemptRestore,
    /// Stop with a terminal [`ReconcileError::UnverifiableLive`] and touch nothing.
    Halt,
}

impl LiveValidationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AttemptRestore => "restore",
            Self::Halt => "halt",
        }
    }
}

impl FromStr for LiveValidationPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "restore" | "attempt-restore" => Ok(Self::AttemptRestore),
            "halt" => Ok(Self::Halt),
            other => Err(format!("Unknown live validation policy: {}", other)),
        }
    }
}

impl fmt::Display for LiveValidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Successful result of one reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The valid live secret was uploaded.
    BackedUp,
    /// A valid backup was created as the live secret.
    Restored,
    /// The live secret is unusable and there is no backup.
    NothingToRestore,
    /// Restore lost a create race; the live secret already exists again.
    AlreadyRestored,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackedUp => "backed_up",
            Self::Restored => "restored",
            Self::NothingToRestore => "nothing_to_restore",
            Self::AlreadyRestored => "already_restored",
        }
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failed reconcile.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Failed to read live secret {identity}: {source}")]
    LiveLookup {
        identity: Identity,
        #[source]
        source: ClusterError,
    },

    #[error("Failed to serialize secret {identity}: {source}")]
    Serialize {
        identity: Identity,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to upload backup {key}: {source}")]
    Upload {
        key: BackupKey,
        #[source]
        source: StorageError,
    },

    #[error("Failed to download backup {key}: {source}")]
    Download {
        key: BackupKey,
        #[source]
        source: StorageError,
    },

    /// The stored object is not a secret.
    #[error("Backup {key} is corrupt: {source}")]
    CorruptBackup {
        key: BackupKey,
        #[source]
        source: serde_json::Error,
    },

    /// The stored secret names a different secret than the one it is stored for.
    #[error("Backup {key} holds secret '{found}', not {identity}")]
    ForeignBackup { key: BackupKey, identity: Identity, found: String },

    /// The stored secret cannot be judged.
    #[error("Backup {key} cannot be verified: {source}")]
    UnverifiableBackup {
        key: BackupKey,
        #[source]
        source: ValidationError,
    },

    /// Both the live secret and its backup are unusable.
    #[error("Backup {key} is not valid: {}", describe(.cause))]
    InvalidBackup { key: BackupKey, cause: Option<InvalidReason> },

    /// The live secret cannot be judged and the policy is [`LiveValidationPolicy::Halt`].
    #[error("Live secret {identity} cannot be verified: {source}")]
    UnverifiableLive {
        identity: Identity,
        #[source]
        source: ValidationError,
    },

    #[error("Failed to restore secret {identity}: {source}")]
    Restore {
        identity: Identity,
        #[source]
        source: ClusterError,
    },

    #[error("Reconcile of {identity} was cancelled")]
    Cancelled { identity: Identity },
}

impl ReconcileError {
    /// True when repeating the reconcile may succeed without outside intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::LiveLookup { .. }
            | Self::Serialize { .. }
            | Self::Upload { .. }
            | Self::Download { .. }
            | Self::Restore { .. }
            | Self::Cancelled { .. } => true,
            Self::CorruptBackup { .. }
            | Self::ForeignBackup { .. }
            | Self::UnverifiableBackup { .. }
            | Self::InvalidBackup { .. }
            | Self::UnverifiableLive { .. } => false,
        }
    }

    /// Metrics label: `retry` or `terminal`.
    pub fn severity(&self) -> &'static str {
        if self.is_retryable() {
            "retry"
        } else {
            "terminal"
        }
    }
}

fn describe(cause: &Option<InvalidReason>) -> String {
    match cause {
        Some(cause) => cause.to_string(),
        None => "failed validation".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Runs the backup/restore decision for one identity at a time.
///
/// The reconciler holds no per-identity state; callers must not run two reconciles of the same
/// identity concurrently.
#[derive(Debug, Clone)]
pub struct Reconciler {
    validator: CredentialValidator,
    storage: Arc<dyn StorageBackend>,
    secrets: Arc<dyn SecretStore>,
    live_policy: LiveValidationPolicy,
    metrics: MetricsRecorder,
}

impl Reconciler {
    pub fn new(
        validator: CredentialValidator,
        storage: Arc<dyn StorageBackend>,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        Self {
            validator,
            storage,
            secrets,
            live_policy: LiveValidationPolicy::default(),
            metrics: MetricsRecorder::new(),
        }
    }

    pub fn with_live_policy(mut self, policy: LiveValidationPolicy) -> Self {
        self.live_policy = policy;
        self
    }

    pub fn live_policy(&self) -> LiveValidationPolicy {
        self.live_policy
    }

    /// Read the live secret from the secret store, then reconcile it.
    pub async fn reconcile(
        &self,
        identity: &Identity,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome> {
        self.observe(identity, async {
            let live = guard(identity, cancel, self.secrets.get(identity))
                .await?
                .map_err(|source| ReconcileError::LiveLookup { identity: identity.clone(), source })?;
            self.decide(identity, live, cancel).await
        })
        .await
    }

    /// Reconcile with a live secret the caller already fetched (`None` when it does not exist).
    pub async fn reconcile_record(
        &self,
        identity: &Identity,
        live: Option<CredentialRecord>,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome> {
        self.observe(identity, self.decide(identity, live, cancel)).await
    }

    async fn observe<F>(&self, identity: &Identity, run: F) -> Result<ReconcileOutcome>
    where
        F: Future<Output = Result<ReconcileOutcome>>,
    {
        let span = crate::reconcile_span!(identity);
        let started = Instant::now();
        let result = run.instrument(span.clone()).await;
        let elapsed = started.elapsed().as_secs_f64();

        let _entered = span.enter();
        match &result {
            Ok(outcome) => {
                span.record("outcome", outcome.as_str());
                info!(outcome = %outcome, "Reconcile finished");
                self.metrics.record_reconcile(outcome.as_str(), elapsed);
            }
            Err(e) => {
                span.record("outcome", e.severity());
                if e.is_retryable() {
                    warn!(error = %e, "Reconcile failed, will retry");
                } else {
                    error!(error = %e, "Reconcile failed, operator action required");
                }
                self.metrics.record_reconcile(e.severity(), elapsed);
            }
        }
        result
    }

    async fn decide(
        &self,
        identity: &Identity,
        live: Option<CredentialRecord>,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome> {
        let key = identity.backup_key();

        let Some(live) = live else {
            debug!("Live secret not found, checking for a backup");
            return self.restore(identity, key, cancel).await;
        };

        match self.validator.validate(&live) {
            Ok(outcome) if outcome.is_valid() => return self.back_up(identity, key, &live, cancel).await,
            Ok(outcome) => {
                info!(cause = %describe(&outcome.cause), "Live secret is not valid, checking for a backup");
            }
            Err(e) => match self.live_policy {
                LiveValidationPolicy::AttemptRestore => {
                    warn!(error = %e, "Unable to verify live secret, checking for a backup");
                }
                LiveValidationPolicy::Halt => {
                    return Err(ReconcileError::UnverifiableLive {
                        identity: identity.clone(),
                        source: e,
                    });
                }
            },
        }

        self.restore(identity, key, cancel).await
    }

    async fn back_up(
        &self,
        identity: &Identity,
        key: BackupKey,
        live: &CredentialRecord,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome> {
        let bytes = live
            .to_bytes()
            .map_err(|source| ReconcileError::Serialize { identity: identity.clone(), source })?;

        let uploaded = guard(identity, cancel, self.storage.upload(key.as_str(), bytes)).await?;
        self.metrics.record_storage_operation("upload", uploaded.is_ok());
        uploaded.map_err(|source| ReconcileError::Upload { key: key.clone(), source })?;

        debug!(key = %key, backend = %self.storage.backend_type(), "Uploaded backup");
        Ok(ReconcileOutcome::BackedUp)
    }

    async fn restore(
        &self,
        identity: &Identity,
        key: BackupKey,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome> {
        let downloaded = guard(identity, cancel, self.storage.download(key.as_str())).await?;
        self.metrics.record_storage_operation(
            "download",
            matches!(&downloaded, Ok(_) | Err(StorageError::NotFound { .. })),
        );

        let bytes = match downloaded {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                debug!(key = %key, "No backup stored");
                return Ok(ReconcileOutcome::NothingToRestore);
            }
            Err(source) => return Err(ReconcileError::Download { key, source }),
        };

        let backup = match CredentialRecord::from_bytes(&bytes) {
            Ok(backup) => backup,
            Err(source) => return Err(ReconcileError::CorruptBackup { key, source }),
        };

        if backup.identity().as_ref() != Ok(identity) {
            let found = format!("{}/{}", backup.metadata.namespace, backup.metadata.name);
            return Err(ReconcileError::ForeignBackup { key, identity: identity.clone(), found });
        }

        let outcome = match self.validator.validate(&backup) {
            Ok(outcome) => outcome,
            Err(source) => return Err(ReconcileError::UnverifiableBackup { key, source }),
        };
        if !outcome.is_valid() {
            return Err(ReconcileError::InvalidBackup { key, cause: outcome.cause });
        }

        let restored = backup.without_bookkeeping();
        match guard(identity, cancel, self.secrets.create(&restored)).await? {
            Ok(()) => {
                info!(key = %key, "Restored secret from backup");
                Ok(ReconcileOutcome::Restored)
            }
            Err(e) if e.is_already_exists() => {
                info!(key = %key, "Secret was recreated concurrently, skipping restore");
                Ok(ReconcileOutcome::AlreadyRestored)
            }
            Err(source) => Err(ReconcileError::Restore { identity: identity.clone(), source }),
        }
    }
}

/// Race `io` against cancellation. A token that is already cancelled wins.
async fn guard<F>(identity: &Identity, cancel: &CancellationToken, io: F) -> Result<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReconcileError::Cancelled { identity: identity.clone() }),
        output = io => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MemorySecretStore;
    use crate::credential::FixedClock;
    use crate::storage::MemoryStorage;
    use crate::test_support::{self, at};

    struct Harness {
        storage: MemoryStorage,
        secrets: MemorySecretStore,
        reconciler: Reconciler,
    }

    fn harness() -> Harness {
        let storage = MemoryStorage::new();
        let secrets = MemorySecretStore::new();
        let validator = CredentialValidator::new(Arc::new(FixedClock::new(at(2021, 8, 1))));
        let reconciler =
            Reconciler::new(validator, Arc::new(storage.clone()), Arc::new(secrets.clone()));
        Harness { storage, secrets, reconciler }
    }

    fn key() -> BackupKey {
        test_support::identity().backup_key()
    }

    fn stored_backup() -> Vec<u8> {
        let mut backup = test_support::valid_record();
        backup.metadata.resource_version = Some("4242".to_string());
        backup.metadata.uid = Some("0b7e0e3c-0000-0000-0000-000000000000".to_string());
        backup.to_bytes().unwrap()
    }

    #[tokio::test]
    async fn test_valid_live_is_uploaded_without_download() {
        let h = harness();
        let live = test_support::valid_record();

        let outcome = h
            .reconciler
            .reconcile_record(&test_support::identity(), Some(live.clone()), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::BackedUp);
        assert_eq!(h.storage.upload_count(), 1);
        assert_eq!(h.storage.download_count(), 0);
        assert_eq!(h.storage.get(key().as_str()).await, Some(live.to_bytes().unwrap()));
    }

    #[tokio::test]
    async fn test_repeated_backup_is_idempotent() {
        let h = harness();
        let live = test_support::valid_record();
        let cancel = CancellationToken::new();

        for _ in 0..3 {
            let outcome = h
                .reconciler
                .reconcile_record(&test_support::identity(), Some(live.clone()), &cancel)
                .await
                .unwrap();
            assert_eq!(outcome, ReconcileOutcome::BackedUp);
        }

        assert_eq!(h.storage.upload_count(), 3);
        assert_eq!(h.storage.list().await.unwrap(), vec![key().as_str().to_string()]);
        assert_eq!(h.storage.get(key().as_str()).await, Some(live.to_bytes().unwrap()));
    }

    #[tokio::test]
    async fn test_absent_live_without_backup_is_noop() {
        let h = harness();

        let outcome = h
            .reconciler
            .reconcile_record(&test_support::identity(), None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::NothingToRestore);
        assert_eq!(h.storage.download_count(), 1);
        assert_eq!(h.secrets.create_count().await, 0);
    }

    #[tokio::test]
    async fn test_expired_live_restored_from_valid_backup() {
        let h = harness();
        h.storage.insert(key().as_str(), stored_backup()).await;

        let outcome = h
            .reconciler
            .reconcile_record(
                &test_support::identity(),
                Some(test_support::expired_record()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Restored);
        assert_eq!(h.storage.upload_count(), 0);

        let created = h.secrets.created().await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].metadata.resource_version, None);
        assert_eq!(created[0].metadata.uid, None);
        assert_eq!(created[0].data, test_support::valid_record().data);
    }

    #[tokio::test]
    async fn test_invalid_backup_is_terminal() {
        let h = harness();
        h.storage.insert(key().as_str(), test_support::expired_record().to_bytes().unwrap()).await;

        let err = h
            .reconciler
            .reconcile_record(
                &test_support::identity(),
                Some(test_support::expired_record()),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::InvalidBackup { cause: Some(InvalidReason::Expired { .. }), .. }));
        assert!(!err.is_retryable());
        assert_eq!(h.secrets.create_count().await, 0);
    }

    #[tokio::test]
    async fn test_download_failure_is_retryable() {
        let h = harness();
        h.storage.insert(key().as_str(), stored_backup()).await;
        h.storage.fail_next_download("AccessDenied").await;

        let err = h
            .reconciler
            .reconcile_record(
                &test_support::identity(),
                Some(test_support::expired_record()),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Download { .. }));
        assert!(err.is_retryable());
        assert_eq!(h.secrets.create_count().await, 0);
    }

    #[tokio::test]
    async fn test_upload_failure_is_retryable() {
        let h = harness();
        h.storage.fail_next_upload("SlowDown").await;

        let err = h
            .reconciler
            .reconcile_record(
                &test_support::identity(),
                Some(test_support::valid_record()),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Upload { .. }));
        assert!(err.is_retryable());
        assert_eq!(h.storage.download_count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_backup_is_terminal() {
        let h = harness();
        h.storage.insert(key().as_str(), b"{not json".to_vec()).await;

        let err = h
            .reconciler
            .reconcile_record(&test_support::identity(), None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::CorruptBackup { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unverifiable_backup_is_terminal() {
        let h = harness();
        let ec = test_support::tls_record(test_support::EC_PKCS8_KEY, test_support::EC_CERT);
        h.storage.insert(key().as_str(), ec.to_bytes().unwrap()).await;

        let err = h
            .reconciler
            .reconcile_record(&test_support::identity(), None, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            ReconcileError::UnverifiableBackup { ref source, .. } => {
                assert!(source.is_unsupported_key())
            }
            ref other => panic!("unexpected error: {:?}", other),
        }
        assert!(!err.is_retryable());
        assert_eq!(h.secrets.create_count().await, 0);
    }

    #[tokio::test]
    async fn test_backup_for_another_secret_is_terminal() {
        let h = harness();
        let other = Identity::new("other", "api-tls").unwrap();
        let foreign = CredentialRecord::new_tls(
            &other,
            test_support::RSA_PKCS8_KEY,
            test_support::VALID_CHAIN,
        );
        h.storage.insert(key().as_str(), foreign.to_bytes().unwrap()).await;

        for _ in 0..2 {
            let err = h
                .reconciler
                .reconcile_record(&test_support::identity(), None, &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, ReconcileError::ForeignBackup { ref found, .. } if found == "other/api-tls"));
            assert!(!err.is_retryable());
        }
        assert_eq!(h.secrets.create_count().await, 0);
        assert!(h.secrets.get(&other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_backup_with_unsafe_metadata_is_terminal() {
        let h = harness();
        let mut crafted = test_support::valid_record();
        crafted.metadata.namespace = "..".to_string();
        crafted.metadata.name = "escaped".to_string();
        h.storage.insert(key().as_str(), crafted.to_bytes().unwrap()).await;

        let err = h
            .reconciler
            .reconcile_record(&test_support::identity(), None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::ForeignBackup { .. }));
        assert_eq!(h.secrets.create_count().await, 0);
    }

    #[tokio::test]
    async fn test_hostname_mismatch_live_falls_through_to_restore() {
        let h = harness();
        h.storage.insert(key().as_str(), stored_backup()).await;
        let live = test_support::tls_record(
            test_support::RSA_PKCS8_KEY,
            test_support::HOSTNAME_MISMATCH_CERT,
        );

        let outcome = h
            .reconciler
            .reconcile_record(&test_support::identity(), Some(live), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Restored);
        assert_eq!(h.storage.upload_count(), 0);
        assert_eq!(h.secrets.created().await[0].data, test_support::valid_record().data);
    }

    #[tokio::test]
    async fn test_unverifiable_live_falls_through_to_restore() {
        let h = harness();
        h.storage.insert(key().as_str(), stored_backup()).await;
        let live = test_support::tls_record(test_support::EC_PKCS8_KEY, test_support::EC_CERT);

        let outcome = h
            .reconciler
            .reconcile_record(&test_support::identity(), Some(live), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Restored);
        assert_eq!(h.storage.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_unverifiable_live_halts_under_halt_policy() {
        let h = harness();
        let reconciler = h.reconciler.clone().with_live_policy(LiveValidationPolicy::Halt);
        let live = test_support::tls_record(test_support::EC_PKCS8_KEY, test_support::EC_CERT);

        let err = reconciler
            .reconcile_record(&test_support::identity(), Some(live), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::UnverifiableLive { .. }));
        assert!(!err.is_retryable());
        assert_eq!(h.storage.download_count(), 0);
        assert_eq!(h.storage.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_create_conflict_counts_as_restored() {
        let h = harness();
        h.storage.insert(key().as_str(), stored_backup()).await;
        h.secrets.insert(test_support::expired_record()).await.unwrap();

        let outcome = h
            .reconciler
            .reconcile_record(
                &test_support::identity(),
                Some(test_support::expired_record()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::AlreadyRestored);
    }

    #[tokio::test]
    async fn test_create_failure_is_retryable() {
        let h = harness();
        h.storage.insert(key().as_str(), stored_backup()).await;
        h.secrets.fail_next_create("etcdserver: request timed out").await;

        let err = h
            .reconciler
            .reconcile_record(&test_support::identity(), None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Restore { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_cancelled_before_io_is_retryable() {
        let h = harness();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = h
            .reconciler
            .reconcile_record(&test_support::identity(), Some(test_support::valid_record()), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Cancelled { .. }));
        assert!(err.is_retryable());
        assert_eq!(h.storage.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_reads_live_from_store() {
        let h = harness();
        h.secrets.insert(test_support::valid_record()).await.unwrap();

        let outcome = h
            .reconciler
            .reconcile(&test_support::identity(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::BackedUp);
        assert_eq!(h.storage.upload_count(), 1);
    }

    #[tokio::test]
    async fn test_live_lookup_failure_is_retryable() {
        let h = harness();
        h.secrets.fail_next_get("connection refused").await;

        let err = h
            .reconciler
            .reconcile(&test_support::identity(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::LiveLookup { .. }));
        assert!(err.is_retryable());
        assert_eq!(h.storage.download_count(), 0);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_terminal_failure_logged_for_operator() {
        let h = harness();
        h.storage.insert(key().as_str(), b"[]".to_vec()).await;

        let _ = h
            .reconciler
            .reconcile_record(&test_support::identity(), None, &CancellationToken::new())
            .await;

        assert!(logs_contain("operator action required"));
        assert!(logs_contain("default/web-tls"));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("restore".parse::<LiveValidationPolicy>(), Ok(LiveValidationPolicy::AttemptRestore));
        assert_eq!("HALT".parse::<LiveValidationPolicy>(), Ok(LiveValidationPolicy::Halt));
        assert!("ignore".parse::<LiveValidationPolicy>().is_err());
    }
}
