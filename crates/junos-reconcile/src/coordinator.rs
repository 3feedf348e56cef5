//! Reconciliation coordinator.
//!
//! Every operation opens its own [`Session`] and closes it before
//! returning:
//!
//! - create: lock, expect absent, set, commit, verify present
//! - update: lock, delete managed keywords + set, commit, verify present
//! - delete: lock, absent means done, delete, commit, verify absent
//! - read/exists: dump under the read guard, no lock
//!
//! Any failure after the lock is taken and before the commit is confirmed
//! runs a best-effort [`Session::clear`] bounded by the configured grace
//! period, cancellation included. A failed post-commit verification does
//! not undo the commit and is reported as a warning.

use std::sync::Arc;

use junos_cfg_common::builder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::commit::CommitMode;
use crate::config::EngineConfig;
use crate::dry_run::DryRunArtifact;
use crate::error::{Presence, ReconcileError, ReconcileResult};
use crate::feature::Feature;
use crate::guard::ReadGuard;
use crate::link::{Connector, Credentials, DeviceTarget};
use crate::session::{cancellable, ConnectOptions, Session};

/// How an apply operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The statements are active on the device.
    Committed,
    /// The statements were written to the dry-run artifact.
    WrittenToArtifact,
    /// Delete found nothing to remove.
    AlreadyAbsent,
}

/// Result of a create, update or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub outcome: ApplyOutcome,
    /// Statements sent to the device or the artifact.
    pub lines: Vec<String>,
    /// Device commit warnings and verification drift.
    pub warnings: Vec<String>,
}

impl ApplyReport {
    fn new(outcome: ApplyOutcome, lines: Vec<String>) -> Self {
        Self {
            outcome,
            lines,
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Drives create/update/delete/read for one device.
pub struct Coordinator<C: Connector> {
    connector: C,
    target: DeviceTarget,
    credentials: Credentials,
    config: EngineConfig,
    guard: ReadGuard,
    artifact: Option<Arc<DryRunArtifact>>,
}

impl<C: Connector> std::fmt::Debug for Coordinator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("target", &self.target)
            .field("credentials", &self.credentials)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Coordinator<C> {
    /// Creates a coordinator with its own read guard.
    pub fn new(
        connector: C,
        target: DeviceTarget,
        credentials: Credentials,
        config: EngineConfig,
    ) -> ReconcileResult<Self> {
        config.validate()?;
        let artifact = match &config.dry_run {
            Some(dry_run) => Some(Arc::new(DryRunArtifact::new(dry_run)?)),
            None => None,
        };
        Ok(Self {
            connector,
            target,
            credentials,
            config,
            guard: ReadGuard::new(),
            artifact,
        })
    }

    /// Shares `guard` with other coordinators of the same device.
    pub fn with_guard(mut self, guard: ReadGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Returns the read guard.
    pub fn guard(&self) -> &ReadGuard {
        &self.guard
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            retry_count: self.config.retry_count,
            timeout: self.config.connect_timeout(),
        }
    }

    /// Opens a session bound to `cancel`.
    pub async fn connect(&self, cancel: &CancellationToken) -> ReconcileResult<Session> {
        Session::connect(
            &self.connector,
            &self.target,
            &self.credentials,
            self.connect_options(),
            cancel.clone(),
        )
        .await
    }

    /// Dry-run artifact for `operation`, if it bypasses the device.
    fn artifact_for(&self, operation: Operation) -> Option<&DryRunArtifact> {
        let dry_run = self.config.dry_run.as_ref()?;
        let enabled = match operation {
            Operation::Create => true,
            Operation::Update => dry_run.update_also,
            Operation::Delete => dry_run.delete_also,
        };
        if enabled {
            self.artifact.as_deref()
        } else {
            None
        }
    }

    /// Creates `feature` with `record`; fails if it already exists.
    #[instrument(skip(self, record, cancel), fields(kind = F::KIND, target = %self.target))]
    pub async fn create<F: Feature>(
        &self,
        feature: &F,
        record: &F::Record,
        cancel: &CancellationToken,
    ) -> ReconcileResult<ApplyReport> {
        builder::validate(record)?;
        let lines = feature.set_lines(record);
        self.apply(Operation::Create, feature, lines, cancel).await
    }

    /// Replaces the managed statements of `feature` with `record`.
    #[instrument(skip(self, record, cancel), fields(kind = F::KIND, target = %self.target))]
    pub async fn update<F: Feature>(
        &self,
        feature: &F,
        record: &F::Record,
        cancel: &CancellationToken,
    ) -> ReconcileResult<ApplyReport> {
        builder::validate(record)?;
        let mut lines = feature.delete_managed_lines();
        lines.extend(feature.set_lines(record));
        self.apply(Operation::Update, feature, lines, cancel).await
    }

    /// Removes `feature`; an absent feature is not an error.
    #[instrument(skip(self, cancel), fields(kind = F::KIND, target = %self.target))]
    pub async fn delete<F: Feature>(
        &self,
        feature: &F,
        cancel: &CancellationToken,
    ) -> ReconcileResult<ApplyReport> {
        let lines = feature.delete_lines();
        self.apply(Operation::Delete, feature, lines, cancel).await
    }

    /// Reads `feature` back from the device; `None` when not configured.
    #[instrument(skip(self, cancel), fields(kind = F::KIND, target = %self.target))]
    pub async fn read<F: Feature>(
        &self,
        feature: &F,
        cancel: &CancellationToken,
    ) -> ReconcileResult<Option<F::Record>> {
        let mut session = self.connect(cancel).await?;
        let result = self.read_in(&mut session, feature, cancel).await;
        self.close(&mut session).await;
        result
    }

    /// Returns true if `feature` holds any configuration.
    #[instrument(skip(self, cancel), fields(kind = F::KIND, target = %self.target))]
    pub async fn exists<F: Feature>(
        &self,
        feature: &F,
        cancel: &CancellationToken,
    ) -> ReconcileResult<bool> {
        let mut session = self.connect(cancel).await?;
        let result = self.presence(&mut session, &feature.path(), cancel).await;
        self.close(&mut session).await;
        result.map(|presence| presence == Presence::Present)
    }

    /// Reads `feature` over an already open session.
    pub async fn read_in<F: Feature>(
        &self,
        session: &mut Session,
        feature: &F,
        cancel: &CancellationToken,
    ) -> ReconcileResult<Option<F::Record>> {
        let path = feature.path();
        let _permit = cancellable(cancel, "read guard", async { Ok(self.guard.acquire().await) })
            .await?;
        let lines = session.show_config_set(&path, true).await?;
        if lines.is_empty() {
            debug!(path = %path, "Nothing configured");
            return Ok(None);
        }
        Ok(Some(F::parse(&lines)?))
    }

    async fn presence(
        &self,
        session: &mut Session,
        path: &str,
        cancel: &CancellationToken,
    ) -> ReconcileResult<Presence> {
        let _permit = cancellable(cancel, "read guard", async { Ok(self.guard.acquire().await) })
            .await?;
        let lines = session.show_config_set(path, false).await?;
        Ok(if lines.is_empty() {
            Presence::Absent
        } else {
            Presence::Present
        })
    }

    async fn apply<F: Feature>(
        &self,
        operation: Operation,
        feature: &F,
        lines: Vec<String>,
        cancel: &CancellationToken,
    ) -> ReconcileResult<ApplyReport> {
        if let Some(artifact) = self.artifact_for(operation) {
            cancellable(cancel, "dry-run write", artifact.append(&lines)).await?;
            info!(
                operation = operation.as_str(),
                path = %artifact.path().display(),
                statements = lines.len(),
                "Wrote statements to dry-run artifact"
            );
            return Ok(ApplyReport::new(ApplyOutcome::WrittenToArtifact, lines));
        }

        let mut session = self.connect(cancel).await?;
        let result = self
            .apply_in(&mut session, operation, &feature.path(), lines, cancel)
            .await;
        self.close(&mut session).await;

        match &result {
            Ok(report) => info!(
                operation = operation.as_str(),
                outcome = ?report.outcome,
                warnings = report.warnings.len(),
                "Operation finished"
            ),
            Err(e) => warn!(operation = operation.as_str(), error = %e, "Operation failed"),
        }
        result
    }

    async fn apply_in(
        &self,
        session: &mut Session,
        operation: Operation,
        path: &str,
        lines: Vec<String>,
        cancel: &CancellationToken,
    ) -> ReconcileResult<ApplyReport> {
        session.lock().await?;

        let report = match self
            .edit_and_commit(session, operation, path, lines, cancel)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                self.clear_best_effort(session).await;
                return Err(e);
            }
        };

        if report.outcome == ApplyOutcome::AlreadyAbsent {
            self.clear_best_effort(session).await;
            return Ok(report);
        }

        Ok(self.verify(session, operation, path, report, cancel).await)
    }

    /// Runs the locked part of an operation, up to a confirmed commit.
    async fn edit_and_commit(
        &self,
        session: &mut Session,
        operation: Operation,
        path: &str,
        lines: Vec<String>,
        cancel: &CancellationToken,
    ) -> ReconcileResult<ApplyReport> {
        match operation {
            Operation::Create => {
                if self.presence(session, path, cancel).await? == Presence::Present {
                    return Err(ReconcileError::existence_mismatch(path, Presence::Absent));
                }
            }
            Operation::Delete => {
                if self.presence(session, path, cancel).await? == Presence::Absent {
                    info!(path = %path, "Already absent");
                    return Ok(ApplyReport::new(ApplyOutcome::AlreadyAbsent, Vec::new()));
                }
            }
            Operation::Update => {}
        }

        session.config_set(&lines).await?;

        let mode = self.config.commit_mode();
        let mut warnings = session
            .commit(mode, &self.config.commit_log_message)
            .await?;

        if let CommitMode::Confirmed(confirmed) = mode {
            let wait = confirmed.verify_wait();
            debug!(wait_secs = wait.as_secs(), "Waiting before commit confirmation");
            cancellable(cancel, "commit confirmation wait", async {
                tokio::time::sleep(wait).await;
                Ok(())
            })
            .await?;
            warnings.extend(session.confirm_commit().await?);
        }

        Ok(ApplyReport {
            outcome: ApplyOutcome::Committed,
            lines,
            warnings,
        })
    }

    /// Post-commit existence check; drift becomes a warning.
    async fn verify(
        &self,
        session: &mut Session,
        operation: Operation,
        path: &str,
        mut report: ApplyReport,
        cancel: &CancellationToken,
    ) -> ApplyReport {
        let expected = match operation {
            Operation::Create | Operation::Update => Presence::Present,
            Operation::Delete => Presence::Absent,
        };
        match self.presence(session, path, cancel).await {
            Ok(found) if found == expected => {}
            Ok(_) => {
                let drift = ReconcileError::existence_mismatch(path, expected);
                warn!(error = %drift, "Post-commit verification found drift");
                report.warnings.push(drift.to_string());
            }
            Err(e) => {
                warn!(error = %e, "Post-commit verification failed");
                report
                    .warnings
                    .push(format!("post-commit verification failed: {}", e));
            }
        }
        report
    }

    /// Discards and unlocks within the grace period; never fails.
    async fn clear_best_effort(&self, session: &mut Session) {
        let grace = self.config.clear_grace();
        match tokio::time::timeout(grace, session.clear()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Clear after failure failed"),
            Err(_) => warn!(grace_secs = grace.as_secs(), "Clear after failure timed out"),
        }
    }

    async fn close(&self, session: &mut Session) {
        let grace = self.config.clear_grace();
        match tokio::time::timeout(grace, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Close failed"),
            Err(_) => warn!(grace_secs = grace.as_secs(), "Close timed out"),
        }
    }
}
