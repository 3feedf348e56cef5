//! Set-configuration building blocks shared by every Junos feature mapping.
//!
//! This crate turns typed configuration records into flat `set`/`delete`
//! statements and reconstructs those records from the device's
//! `display set relative` dump:
//!
//! - [`codec`]: quoting, prefix cutting and dump framing helpers
//! - [`secret`]: `$9$` secret encoding and decoding
//! - [`schema`]: the field-rule catalog a record type declares
//! - [`builder`]: record → ordered statements
//! - [`reconstruct`]: statements → record, with upsert-by-key for repeated blocks
//! - [`error`]: error types for parse and validation failures
//!
//! # Example
//!
//! ```ignore
//! use junos_cfg_common::{builder, reconstruct, codec::SET_LS};
//!
//! let prefix = "protocols bgp group G ";
//! let lines = builder::build(prefix, &group);
//! let back: BgpGroup = reconstruct::reconstruct(&lines, &format!("{SET_LS}{prefix}"))?;
//! assert_eq!(back, group);
//! ```
//!
//! Every optional scalar carries a sentinel default (`-1`, `""`, `false`).
//! The builder omits a field equal to its sentinel and the reconstructor
//! leaves the sentinel in place when no line mentions the field, so a
//! build/reconstruct pair is lossless for any record made of declared fields.

pub mod builder;
pub mod codec;
pub mod error;
pub mod reconstruct;
pub mod schema;
pub mod secret;

// Re-export commonly used items at crate root
pub use error::{CfgError, CfgResult};
pub use schema::{Keyed, KeyedBlocks, NestedRule, Qualifier, Rule, Schema, SubBlock};
