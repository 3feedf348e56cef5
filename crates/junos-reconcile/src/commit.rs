//! Commit descriptor.

use std::time::Duration;

/// Default share of the confirmed-commit timeout to wait before confirming.
pub const DEFAULT_VERIFY_WAIT_PERCENT: u8 = 90;

/// How a candidate configuration is activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitMode {
    /// Single synchronous activation.
    #[default]
    Plain,
    /// Activation that the device reverts unless confirmed in time.
    Confirmed(ConfirmedCommit),
}

/// Parameters of a confirmed commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedCommit {
    /// Minutes until the device rolls the commit back, `1..=65535`.
    pub timeout_minutes: u16,
    /// Share of the timeout to wait before confirming, `0..=99`.
    pub verify_wait_percent: u8,
}

impl ConfirmedCommit {
    /// Creates a confirmed commit with the default verify wait.
    pub fn new(timeout_minutes: u16) -> Self {
        Self {
            timeout_minutes,
            verify_wait_percent: DEFAULT_VERIFY_WAIT_PERCENT,
        }
    }

    /// Time to wait between the commit and its confirmation.
    pub fn verify_wait(&self) -> Duration {
        let seconds =
            u64::from(self.timeout_minutes) * 60 * u64::from(self.verify_wait_percent) / 100;
        Duration::from_secs(seconds)
    }

    /// Time after which the device rolls the commit back.
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_minutes) * 60)
    }
}

impl CommitMode {
    /// Returns the rollback timeout sent with the commit, if any.
    pub fn confirm_minutes(&self) -> Option<u16> {
        match self {
            CommitMode::Plain => None,
            CommitMode::Confirmed(confirmed) => Some(confirmed.timeout_minutes),
        }
    }
}
