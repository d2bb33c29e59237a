//! # Reconcile Loop
//!
//! Drives the [`Reconciler`] for a fixed set of identities. Each identity gets its own task, so
//! reconciles of one identity never overlap while different identities proceed independently.
//!
//! After each run the task sleeps:
//! - the resync interval after success or a terminal failure
//! - an exponential backoff after a retryable failure, growing with consecutive failures
//!
//! All tasks stop when the shutdown token is cancelled. An in-flight reconcile observes the
//! same token and returns a retryable `Cancelled` error.

use crate::config::LoopConfig;
use crate::credential::Identity;
use crate::reconcile::{ReconcileError, ReconcileOutcome, Reconciler};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// Backoff policy for retryable reconcile failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Backoff before the first retry
    pub initial_backoff: Duration,
    /// Cap for exponential growth
    pub max_backoff: Duration,
    /// Multiplier applied per consecutive failure
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Backoff after `attempt` consecutive retryable failures (0 means no failure yet).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let multiplier = self.backoff_multiplier.powi(exponent);
        let backoff_ms = self.initial_backoff.as_millis() as f64 * multiplier;
        let capped_ms = backoff_ms.min(self.max_backoff.as_millis() as f64);

        Duration::from_millis(capped_ms as u64)
    }
}

impl LoopConfig {
    /// Delay before the next reconcile, updating the consecutive failure count.
    pub fn next_delay(
        &self,
        result: &Result<ReconcileOutcome, ReconcileError>,
        failures: &mut u32,
    ) -> Duration {
        match result {
            Err(e) if e.is_retryable() => {
                *failures = failures.saturating_add(1);
                self.retry.backoff_for_attempt(*failures)
            }
            _ => {
                *failures = 0;
                self.resync_interval
            }
        }
    }
}

/// Per-identity counters reported when the loop stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityReport {
    pub identity: Identity,
    pub runs: u64,
    pub successes: u64,
    pub retryable_failures: u64,
    pub terminal_failures: u64,
}

impl IdentityReport {
    fn new(identity: Identity) -> Self {
        Self { identity, runs: 0, successes: 0, retryable_failures: 0, terminal_failures: 0 }
    }

    fn record(&mut self, result: &Result<ReconcileOutcome, ReconcileError>) {
        self.runs += 1;
        match result {
            Ok(_) => self.successes += 1,
            Err(e) if e.is_retryable() => self.retryable_failures += 1,
            Err(_) => self.terminal_failures += 1,
        }
    }
}

/// Periodic reconcile of a set of identities.
#[derive(Debug)]
pub struct ReconcileLoop {
    reconciler: Reconciler,
    identities: Vec<Identity>,
    config: LoopConfig,
}

impl ReconcileLoop {
    pub fn new(reconciler: Reconciler, identities: Vec<Identity>, config: LoopConfig) -> Self {
        Self { reconciler, identities, config }
    }

    /// Run until `shutdown` is cancelled, then return one report per identity.
    pub async fn run(self, shutdown: CancellationToken) -> Vec<IdentityReport> {
        let mut tasks = JoinSet::new();
        for identity in self.identities {
            let span = tracing::info_span!("reconcile_loop", secret = %identity);
            tasks.spawn(
                drive(self.reconciler.clone(), identity, self.config.clone(), shutdown.clone())
                    .instrument(span),
            );
        }

        info!(identities = tasks.len(), "Reconcile loop started");

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => warn!(error = %e, "Reconcile task ended abnormally"),
            }
        }
        reports.sort_by(|a, b| a.identity.cmp(&b.identity));

        info!(identities = reports.len(), "Reconcile loop stopped");
        reports
    }
}

async fn drive(
    reconciler: Reconciler,
    identity: Identity,
    config: LoopConfig,
    shutdown: CancellationToken,
) -> IdentityReport {
    let mut report = IdentityReport::new(identity);
    let mut failures = 0u32;

    while !shutdown.is_cancelled() {
        let result = reconciler.reconcile(&report.identity, &shutdown).await;
        if shutdown.is_cancelled() {
            break;
        }
        report.record(&result);

        let delay = config.next_delay(&result, &mut failures);
        debug!(delay_ms = delay.as_millis() as u64, failures, "Next reconcile scheduled");

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    report
}
