//! Integration test infrastructure for the Junos reconciliation engine
//!
//! Provides:
//! - An in-memory device with a shared lock, candidate and event log
//! - Fault injection (connect, lock, load, commit, dump)
//! - Test fixtures for engine configurations and feature records
//! - Device-state verification helpers

pub mod fixtures;
pub mod mock;
mod verification;

pub use fixtures::*;
pub use mock::{Event, EventKind, Faults, MockConnector, MockDevice, MockLink};
pub use verification::*;
