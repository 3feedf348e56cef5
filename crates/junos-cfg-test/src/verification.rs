//! Verification helpers for testing the reconciliation engine
//!
//! Provides assertion helpers over the mock device state and event log

use thiserror::Error;

use crate::mock::{EventKind, MockDevice};

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Configuration lock still held by link {link}")]
    StillLocked { link: u64 },

    #[error("{count} link(s) left open")]
    LinksOpen { count: usize },

    #[error("Pending candidate edit left behind: {statements:?}")]
    CandidateLeft { statements: Vec<String> },

    #[error("Expected statement '{statement}' not found in running configuration")]
    StatementNotFound { statement: String },

    #[error("Unexpected statement '{statement}' found in running configuration")]
    UnexpectedStatement { statement: String },

    #[error("Expected events {expected:?} in order, got {actual:?}")]
    EventSequence {
        expected: Vec<EventKind>,
        actual: Vec<EventKind>,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Mock device verification helper
pub struct DeviceVerifier<'a> {
    device: &'a MockDevice,
}

impl<'a> DeviceVerifier<'a> {
    /// Create a new device verifier
    pub fn new(device: &'a MockDevice) -> Self {
        Self { device }
    }

    /// Verify that no session holds the configuration lock
    pub fn assert_unlocked(&self) -> VerifyResult<()> {
        match self.device.lock_holder() {
            Some(link) => Err(VerificationError::StillLocked { link }),
            None => Ok(()),
        }
    }

    /// Verify that every link was closed
    pub fn assert_all_closed(&self) -> VerifyResult<()> {
        match self.device.open_links() {
            0 => Ok(()),
            count => Err(VerificationError::LinksOpen { count }),
        }
    }

    /// Verify that no candidate edit is pending
    pub fn assert_no_candidate(&self) -> VerifyResult<()> {
        match self.device.candidate() {
            Some(statements) => Err(VerificationError::CandidateLeft { statements }),
            None => Ok(()),
        }
    }

    /// Verify the device is back to idle: unlocked, no candidate, no open link
    pub fn assert_idle(&self) -> VerifyResult<()> {
        self.assert_unlocked()?;
        self.assert_no_candidate()?;
        self.assert_all_closed()
    }

    /// Verify that every statement is part of the running configuration
    pub fn assert_statements(&self, statements: &[&str]) -> VerifyResult<()> {
        for statement in statements {
            if !self.device.has_statement(statement) {
                return Err(VerificationError::StatementNotFound {
                    statement: statement.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Verify that no running statement lies at or below `path`
    pub fn assert_path_absent(&self, path: &str) -> VerifyResult<()> {
        let prefix = format!("{} ", path);
        match self
            .device
            .running()
            .into_iter()
            .find(|s| s == path || s.starts_with(&prefix))
        {
            Some(statement) => Err(VerificationError::UnexpectedStatement { statement }),
            None => Ok(()),
        }
    }

    /// Verify that `expected` occurs in the event log as a subsequence
    pub fn assert_event_order(&self, expected: &[EventKind]) -> VerifyResult<()> {
        let actual = self.device.event_kinds();
        let mut remaining = expected.iter().peekable();
        for kind in &actual {
            if remaining.peek() == Some(&kind) {
                remaining.next();
            }
        }
        if remaining.peek().is_none() {
            Ok(())
        } else {
            Err(VerificationError::EventSequence {
                expected: expected.to_vec(),
                actual,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_device_is_idle() {
        let device = MockDevice::new("r1");
        let verifier = DeviceVerifier::new(&device);
        assert!(verifier.assert_idle().is_ok());
        assert!(verifier.assert_event_order(&[]).is_ok());
        assert!(verifier.assert_event_order(&[EventKind::Connect]).is_err());
    }

    #[test]
    fn test_statement_checks() {
        let device = MockDevice::new("r1");
        device.load_running(&["set protocols lldp interface all"]);
        let verifier = DeviceVerifier::new(&device);
        assert!(verifier
            .assert_statements(&["protocols lldp interface all"])
            .is_ok());
        assert!(verifier.assert_path_absent("protocols lldp").is_err());
        assert!(verifier.assert_path_absent("protocols bgp").is_ok());
    }
}
