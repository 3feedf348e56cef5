//! Feature seam between typed records and the coordinator.

use std::fmt;

use junos_cfg_common::codec::SET_LS;
use junos_cfg_common::{builder, reconstruct, CfgResult, Schema};

/// One configurable object on the device: where it lives and which record
/// describes it.
///
/// Implementors only locate the object; statement generation and parsing
/// come from the record's rule catalog.
pub trait Feature: fmt::Debug + Send + Sync {
    /// Record describing the object's managed statements.
    type Record: Schema;

    /// Short name used in logs (`bgp-group`).
    const KIND: &'static str;

    /// Hierarchy prefix of this object, ending with a space.
    fn prefix(&self) -> String;

    /// Hierarchy path of this object, as used by `show configuration`.
    fn path(&self) -> String {
        self.prefix().trim_end().to_string()
    }

    /// Statements creating `record` at this object's prefix.
    fn set_lines(&self, record: &Self::Record) -> Vec<String> {
        builder::build(&self.prefix(), record)
    }

    /// Statements removing every managed keyword of this object.
    fn delete_managed_lines(&self) -> Vec<String> {
        builder::build_delete::<Self::Record>(&self.prefix())
    }

    /// Statements removing the object entirely.
    fn delete_lines(&self) -> Vec<String> {
        vec![builder::delete_all(&self.prefix())]
    }

    /// Reconstructs the record from a `display set relative` dump.
    fn parse<S: AsRef<str>>(lines: &[S]) -> CfgResult<Self::Record> {
        reconstruct::reconstruct(lines, SET_LS)
    }
}
