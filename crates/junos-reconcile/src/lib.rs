//! Reconciliation engine for Junos set-configuration.
//!
//! The engine applies typed configuration records to a device that exposes
//! one shared candidate configuration behind an exclusive lock:
//!
//! - [`link`]: the transport seam ([`DeviceLink`], [`Connector`])
//! - [`session`]: connect-with-retry, lock, load, commit, clear, close
//! - [`coordinator`]: the per-operation protocol with clear-on-failure and
//!   post-commit verification
//! - [`guard`]: the read guard shared by all readers of one device
//! - [`dry_run`]: the file-backed "fake apply" mode
//! - [`features`]: BGP group and LLDP interface catalogs
//!
//! # Example
//!
//! ```ignore
//! use junos_reconcile::{Coordinator, Credentials, DeviceTarget, EngineConfig};
//! use junos_reconcile::features::{BgpGroup, BgpGroupConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let coordinator = Coordinator::new(
//!     connector,
//!     DeviceTarget::new("edge-r1"),
//!     Credentials::password("netops", password),
//!     EngineConfig::from_file("/etc/junos-reconcile.yaml")?,
//! )?;
//!
//! let group = BgpGroup::new("TRANSIT");
//! let config = BgpGroupConfig { hold_time: 30, ..Default::default() };
//! let report = coordinator.create(&group, &config, &CancellationToken::new()).await?;
//! ```

pub mod commit;
pub mod config;
pub mod coordinator;
pub mod dry_run;
pub mod error;
pub mod feature;
pub mod features;
pub mod guard;
pub mod identity;
pub mod link;
pub mod logging;
pub mod session;

// Re-export commonly used items at crate root
pub use commit::{CommitMode, ConfirmedCommit};
pub use config::{DryRunConfig, EngineConfig};
pub use coordinator::{ApplyOutcome, ApplyReport, Coordinator};
pub use error::{Presence, ReconcileError, ReconcileResult};
pub use feature::Feature;
pub use guard::ReadGuard;
pub use identity::DeviceIdentity;
pub use link::{Authentication, Connector, Credentials, DeviceLink, DeviceTarget, LinkError};
pub use session::{ConnectOptions, Session, SessionState};
