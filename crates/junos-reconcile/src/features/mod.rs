//! Feature catalogs.

pub mod bgp_group;
pub mod lldp_interface;

pub use bgp_group::{BgpFamily, BgpGroup, BgpGroupConfig, PrefixLimit, Teardown};
pub use lldp_interface::{LldpInterface, LldpInterfaceConfig};
