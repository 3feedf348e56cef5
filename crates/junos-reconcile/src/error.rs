//! Error types for session and reconciliation operations.
//!
//! Every user-visible failure carries the device diagnostic or the
//! offending statement verbatim.

use std::fmt;
use std::io;
use std::path::PathBuf;

use junos_cfg_common::CfgError;
use thiserror::Error;

/// Result type alias for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Expected state of a configuration path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The path holds at least one statement.
    Present,
    /// The path holds no statement.
    Absent,
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Presence::Present => write!(f, "present"),
            Presence::Absent => write!(f, "absent"),
        }
    }
}

/// Errors that can occur while reconciling configuration with a device.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Transport could not be established after all attempts.
    #[error("Failed to connect to {host} after {attempts} attempt(s): {message}")]
    Connect {
        /// Target host and port.
        host: String,
        /// Number of attempts made.
        attempts: u8,
        /// Last transport error.
        message: String,
    },

    /// The exclusive configuration lock was refused.
    #[error("Failed to lock configuration on {host}: {message}")]
    Lock {
        /// Target host and port.
        host: String,
        /// Device diagnostic.
        message: String,
    },

    /// The device rejected a statement of the candidate edit.
    #[error("Failed to load configuration: {message}")]
    Apply {
        /// Device diagnostic, naming the rejected statement.
        message: String,
    },

    /// The device refused to activate the candidate configuration.
    #[error("Commit failed: {message}")]
    Commit {
        /// Device diagnostic.
        message: String,
    },

    /// A read-only query failed.
    #[error("Query '{command}' failed: {message}")]
    Query {
        /// The query sent to the device.
        command: String,
        /// Device or decoder diagnostic.
        message: String,
    },

    /// A record could not be rendered or reconstructed.
    #[error(transparent)]
    Parse(#[from] CfgError),

    /// An existence check found the opposite of what was expected.
    #[error("Configuration at '{path}' is not {expected}")]
    ExistenceMismatch {
        /// The checked hierarchy path.
        path: String,
        /// What the check expected.
        expected: Presence,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled during {stage}")]
    Cancelled {
        /// The step that was interrupted.
        stage: String,
    },

    /// Engine configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Local file operation failed.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl ReconcileError {
    /// Creates a lock error.
    pub fn lock(host: impl ToString, message: impl ToString) -> Self {
        Self::Lock {
            host: host.to_string(),
            message: message.to_string(),
        }
    }

    /// Creates a query error.
    pub fn query(command: impl Into<String>, message: impl ToString) -> Self {
        Self::Query {
            command: command.into(),
            message: message.to_string(),
        }
    }

    /// Creates an existence mismatch error.
    pub fn existence_mismatch(path: impl Into<String>, expected: Presence) -> Self {
        Self::ExistenceMismatch {
            path: path.into(),
            expected,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(stage: impl Into<String>) -> Self {
        Self::Cancelled {
            stage: stage.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an IO error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on retry.
    ///
    /// Connect failures have already been retried up to the configured
    /// bound by the time they surface.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReconcileError::Connect { .. })
    }

    /// Returns true if another session holds the configuration lock.
    ///
    /// The engine never waits for the lock; callers decide whether to retry.
    pub fn is_contention(&self) -> bool {
        matches!(self, ReconcileError::Lock { .. })
    }
}
