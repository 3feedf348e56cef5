//! Error types for set-configuration parsing and validation.
//!
//! Parse errors always carry the offending configuration line verbatim so
//! a failure can be matched against the device's own CLI output.

use thiserror::Error;

/// Result type alias for codec, builder and reconstructor operations.
pub type CfgResult<T> = Result<T, CfgError>;

/// Errors raised while converting between records and statements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CfgError {
    /// A numeric field did not hold an integer.
    #[error("Failed to convert value to integer in line '{line}': {message}")]
    InvalidInteger {
        /// The configuration line as received from the device.
        line: String,
        /// The conversion error.
        message: String,
    },

    /// A secret-valued field could not be decoded.
    #[error("Failed to decode secret in line '{line}': {message}")]
    InvalidSecret {
        /// The configuration line as received from the device.
        line: String,
        /// The decode error.
        message: String,
    },

    /// A record cannot be rendered as configuration.
    #[error("Invalid value for {field}: {message}")]
    InvalidRecord {
        /// The field (keyword) that failed validation.
        field: String,
        /// Error message.
        message: String,
    },
}

impl CfgError {
    /// Creates an invalid integer error for `line`.
    pub fn invalid_integer(line: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidInteger {
            line: line.into(),
            message: message.to_string(),
        }
    }

    /// Creates an invalid secret error for `line`.
    pub fn invalid_secret(line: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidSecret {
            line: line.into(),
            message: message.to_string(),
        }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns the configuration line the error was raised for, if any.
    pub fn line(&self) -> Option<&str> {
        match self {
            CfgError::InvalidInteger { line, .. } | CfgError::InvalidSecret { line, .. } => {
                Some(line)
            }
            CfgError::InvalidRecord { .. } => None,
        }
    }
}
