//! Engine configuration.
//!
//! Loaded from YAML:
//!
//! ```yaml
//! retry_count: 3
//! connect_timeout_secs: 10
//! commit_confirmed_minutes: 10
//! commit_confirmed_wait_percent: 90
//! commit_log_message: "pushed by automation"
//! dry_run:
//!   path: /var/tmp/junos-dry-run.set
//!   file_mode: "0600"
//!   update_also: true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::commit::{CommitMode, ConfirmedCommit, DEFAULT_VERIFY_WAIT_PERCENT};
use crate::error::{ReconcileError, ReconcileResult};

/// Maximum connect attempts.
pub const MAX_RETRY_COUNT: u8 = 10;

/// Default commit log message.
pub const DEFAULT_COMMIT_LOG_MESSAGE: &str = "pushed by junos-reconcile";

/// Default permission bits of the dry-run artifact.
pub const DEFAULT_FILE_MODE: &str = "0644";

/// Tunables of the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Connect attempts before giving up, `1..=10`.
    pub retry_count: u8,
    /// Per-attempt connect timeout; 0 disables it.
    pub connect_timeout_secs: u64,
    /// Confirmed-commit timeout in minutes; 0 selects a plain commit.
    pub commit_confirmed_minutes: u32,
    /// Share of the confirmed-commit timeout to wait before confirming.
    pub commit_confirmed_wait_percent: u8,
    /// Log message recorded with every commit.
    pub commit_log_message: String,
    /// Write statements to a file instead of the device.
    pub dry_run: Option<DryRunConfig>,
    /// Upper bound for the discard/unlock issued after a failure.
    pub clear_grace_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_count: 1,
            connect_timeout_secs: 10,
            commit_confirmed_minutes: 0,
            commit_confirmed_wait_percent: DEFAULT_VERIFY_WAIT_PERCENT,
            commit_log_message: DEFAULT_COMMIT_LOG_MESSAGE.to_string(),
            dry_run: None,
            clear_grace_secs: 5,
        }
    }
}

/// Dry-run ("fake apply") settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DryRunConfig {
    /// Artifact file receiving the statements.
    pub path: PathBuf,
    /// Octal permission bits used when the file is created.
    #[serde(default = "default_file_mode")]
    pub file_mode: String,
    /// Updates write to the artifact too.
    #[serde(default)]
    pub update_also: bool,
    /// Deletes write to the artifact too.
    #[serde(default)]
    pub delete_also: bool,
}

fn default_file_mode() -> String {
    DEFAULT_FILE_MODE.to_string()
}

impl DryRunConfig {
    /// Creates settings for `path` with default mode and create-only scope.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_mode: default_file_mode(),
            update_also: false,
            delete_also: false,
        }
    }

    /// Parses `file_mode` into permission bits.
    pub fn mode(&self) -> ReconcileResult<u32> {
        let digits = self.file_mode.trim_start_matches("0o");
        let mode = u32::from_str_radix(digits, 8).map_err(|_| {
            ReconcileError::invalid_config(
                "dry_run.file_mode",
                format!("'{}' is not an octal mode", self.file_mode),
            )
        })?;
        if mode > 0o777 {
            return Err(ReconcileError::invalid_config(
                "dry_run.file_mode",
                format!("'{}' exceeds 0777", self.file_mode),
            ));
        }
        Ok(mode)
    }
}

impl EngineConfig {
    /// Parses and validates a YAML document.
    pub fn from_yaml_str(yaml: &str) -> ReconcileResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| ReconcileError::invalid_config("yaml", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> ReconcileResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| ReconcileError::io(path, e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Checks every field against its allowed range.
    pub fn validate(&self) -> ReconcileResult<()> {
        if !(1..=MAX_RETRY_COUNT).contains(&self.retry_count) {
            return Err(ReconcileError::invalid_config(
                "retry_count",
                format!("{} is outside 1..={}", self.retry_count, MAX_RETRY_COUNT),
            ));
        }
        if self.commit_confirmed_minutes > u32::from(u16::MAX) {
            return Err(ReconcileError::invalid_config(
                "commit_confirmed_minutes",
                format!(
                    "{} is outside 1..={}",
                    self.commit_confirmed_minutes,
                    u16::MAX
                ),
            ));
        }
        if self.commit_confirmed_wait_percent > 99 {
            return Err(ReconcileError::invalid_config(
                "commit_confirmed_wait_percent",
                format!("{} is outside 0..=99", self.commit_confirmed_wait_percent),
            ));
        }
        if self.commit_log_message.contains(['\n', '\r']) {
            return Err(ReconcileError::invalid_config(
                "commit_log_message",
                "must be a single line",
            ));
        }
        if let Some(dry_run) = &self.dry_run {
            if dry_run.path.as_os_str().is_empty() {
                return Err(ReconcileError::invalid_config(
                    "dry_run.path",
                    "must not be empty",
                ));
            }
            dry_run.mode()?;
        }
        Ok(())
    }

    /// Returns the commit descriptor selected by this configuration.
    pub fn commit_mode(&self) -> CommitMode {
        match u16::try_from(self.commit_confirmed_minutes) {
            Ok(0) | Err(_) => CommitMode::Plain,
            Ok(timeout_minutes) => CommitMode::Confirmed(ConfirmedCommit {
                timeout_minutes,
                verify_wait_percent: self.commit_confirmed_wait_percent,
            }),
        }
    }

    /// Returns the per-attempt connect timeout, if any.
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }

    /// Returns the bound for the best-effort discard/unlock.
    pub fn clear_grace(&self) -> Duration {
        Duration::from_secs(self.clear_grace_secs)
    }
}
