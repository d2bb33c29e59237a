//! # Command Line Interface
//!
//! `cert-backup run` keeps the configured identities reconciled until interrupted. The other
//! commands are one-shot operator tools: reconcile one identity, list stored backups, and judge
//! a manifest file.

use crate::cluster::FileSecretStore;
use crate::config::Config;
use crate::credential::{CredentialRecord, Identity};
use crate::observability::{init_logging, init_observability, log_config_info};
use crate::reconcile::Reconciler;
use crate::scheduler::ReconcileLoop;
use crate::validation::CredentialValidator;
use crate::{storage, APP_NAME, VERSION};
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "cert-backup")]
#[command(about = "Back up TLS secrets and restore them when they go missing or expire")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile configured identities until interrupted
    Run {
        /// Additional identity to reconcile, as namespace/name (repeatable)
        #[arg(long = "identity")]
        identities: Vec<Identity>,
    },

    /// Reconcile a single identity once
    Reconcile {
        /// Identity as namespace/name
        identity: Identity,
    },

    /// List stored backup objects
    Backups,

    /// Validate a secret manifest
    Check {
        /// Path to a JSON secret manifest
        manifest: PathBuf,

        /// Judge validity at this instant (RFC 3339) instead of now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { identities } => {
            let mut config = load_config(cli.verbose)?;
            init_observability(&config.observability).await?;
            for identity in identities {
                if !config.identities.contains(&identity) {
                    config.identities.push(identity);
                }
            }
            run_loop(config).await
        }
        Commands::Reconcile { identity } => {
            let config = load_config(cli.verbose)?;
            init_logging(&config.observability)?;
            reconcile_once(&config, identity).await
        }
        Commands::Backups => {
            let config = load_config(cli.verbose)?;
            init_logging(&config.observability)?;
            list_backups(&config).await
        }
        Commands::Check { manifest, at } => check_manifest(&manifest, at).await,
    }
}

fn load_config(verbose: bool) -> anyhow::Result<Config> {
    let mut config = Config::from_env()?;
    if verbose {
        config.observability.log_level = "debug".to_string();
    }
    Ok(config)
}

async fn build_reconciler(config: &Config) -> anyhow::Result<Reconciler> {
    let storage = storage::from_config(&config.storage)
        .await
        .context("failed to initialise backup storage")?;
    let secrets = Arc::new(FileSecretStore::new(&config.secrets_dir));

    Ok(Reconciler::new(CredentialValidator::default(), storage, secrets)
        .with_live_policy(config.live_policy))
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
        }
        token.cancel();
    });
}

async fn run_loop(config: Config) -> anyhow::Result<()> {
    if config.identities.is_empty() {
        anyhow::bail!("no identities configured; set CERT_BACKUP_IDENTITIES or pass --identity");
    }

    info!(app_name = APP_NAME, version = VERSION, "Starting cert-backup");
    log_config_info(&config);

    let reconciler = build_reconciler(&config).await?;
    let shutdown = CancellationToken::new();
    cancel_on_interrupt(shutdown.clone());

    let reports =
        ReconcileLoop::new(reconciler, config.identities.clone(), config.scheduler.clone())
            .run(shutdown)
            .await;

    for report in &reports {
        info!(
            secret = %report.identity,
            runs = report.runs,
            successes = report.successes,
            retryable_failures = report.retryable_failures,
            terminal_failures = report.terminal_failures,
            "Reconcile summary"
        );
    }
    Ok(())
}

async fn reconcile_once(config: &Config, identity: Identity) -> anyhow::Result<()> {
    let reconciler = build_reconciler(config).await?;
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    match reconciler.reconcile(&identity, &cancel).await {
        Ok(outcome) => {
            println!("{}: {}", identity, outcome);
            Ok(())
        }
        Err(e) => {
            if e.is_retryable() {
                warn!(secret = %identity, "Failure is transient; running again may succeed");
            }
            Err(anyhow::Error::new(e).context(format!("reconcile of {} failed", identity)))
        }
    }
}

async fn list_backups(config: &Config) -> anyhow::Result<()> {
    let storage = storage::from_config(&config.storage)
        .await
        .context("failed to initialise backup storage")?;

    let names = storage.list().await.context("failed to list backups")?;
    if names.is_empty() {
        println!("No backups stored in {} storage", storage.backend_type());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

async fn check_manifest(path: &Path, at: Option<DateTime<Utc>>) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let record = CredentialRecord::from_bytes(&bytes)
        .with_context(|| format!("{} is not a secret manifest", path.display()))?;

    let identity = record
        .identity()
        .with_context(|| format!("{} does not name a valid secret", path.display()))?;

    let now = at.unwrap_or_else(Utc::now);
    let outcome = CredentialValidator::validate_at(&record, now)
        .with_context(|| format!("{} cannot be verified", identity))?;

    match outcome.cause {
        None => {
            println!("{}: valid at {}", identity, now.to_rfc3339());
            Ok(())
        }
        Some(cause) => {
            anyhow::bail!("{}: not valid at {}: {}", identity, now.to_rfc3339(), cause)
        }
    }
}
