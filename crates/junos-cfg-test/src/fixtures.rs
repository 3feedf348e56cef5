//! Test fixtures for common reconciliation patterns
//!
//! Provides ready-made devices, engine configurations and feature records

use junos_reconcile::features::{
    BgpFamily, BgpGroup, BgpGroupConfig, LldpInterface, LldpInterfaceConfig, PrefixLimit,
    Teardown,
};
use junos_reconcile::{
    Coordinator, Credentials, DeviceTarget, DryRunConfig, EngineConfig, ReconcileResult,
};

use crate::mock::{MockConnector, MockDevice};

/// Hostname the mock device reports.
pub const TEST_HOSTNAME: &str = "lab-r1";

/// Target used by every fixture coordinator.
pub fn target() -> DeviceTarget {
    DeviceTarget::new(TEST_HOSTNAME)
}

/// Credentials used by every fixture coordinator.
pub fn credentials() -> Credentials {
    Credentials::password("netops", "lab-password")
}

/// Builds a coordinator for `device`.
pub fn coordinator(
    device: &MockDevice,
    config: EngineConfig,
) -> ReconcileResult<Coordinator<MockConnector>> {
    Coordinator::new(device.connector(), target(), credentials(), config)
}

/// Engine configuration fixtures
pub mod config_fixtures {
    use super::*;
    use std::path::Path;

    /// Plain commits, no dry-run
    pub fn plain() -> EngineConfig {
        EngineConfig::default()
    }

    /// Connect retries with the given attempt count
    pub fn with_retries(retry_count: u8) -> EngineConfig {
        EngineConfig {
            retry_count,
            ..EngineConfig::default()
        }
    }

    /// Confirmed commits
    pub fn confirmed(timeout_minutes: u32, wait_percent: u8) -> EngineConfig {
        EngineConfig {
            commit_confirmed_minutes: timeout_minutes,
            commit_confirmed_wait_percent: wait_percent,
            ..EngineConfig::default()
        }
    }

    /// Dry-run into `path`
    pub fn dry_run(path: &Path, update_also: bool, delete_also: bool) -> EngineConfig {
        EngineConfig {
            dry_run: Some(DryRunConfig {
                update_also,
                delete_also,
                ..DryRunConfig::new(path)
            }),
            ..EngineConfig::default()
        }
    }
}

/// Common BGP group fixtures
pub mod bgp_fixtures {
    use super::*;

    /// Group `G` in the master instance
    pub fn group_g() -> BgpGroup {
        BgpGroup::new("G")
    }

    /// hold-time 30, local-preference unset, two export policies
    pub fn hold_time_and_exports() -> BgpGroupConfig {
        BgpGroupConfig {
            hold_time: 30,
            export: vec!["POL1".to_string(), "POL2".to_string()],
            ..BgpGroupConfig::default()
        }
    }

    /// External transit group using every statement family
    pub fn transit() -> BgpGroupConfig {
        BgpGroupConfig {
            group_type: "external".to_string(),
            description: "transit peers".to_string(),
            hold_time: 90,
            local_preference: 120,
            passive: false,
            authentication_key: "transit-md5".to_string(),
            export: vec!["EXPORT-TRANSIT".to_string()],
            import: vec!["IMPORT-TRANSIT".to_string(), "IMPORT-DEFAULT".to_string()],
            allow: ["192.0.2.0/24".to_string()].into_iter().collect(),
            family: vec![
                BgpFamily {
                    accepted_prefix_limit: Some(PrefixLimit {
                        maximum: 10,
                        teardown: Some(Teardown {
                            limit_threshold: 80,
                            idle_timeout: 30,
                            idle_timeout_forever: false,
                        }),
                    }),
                    ..BgpFamily::new("inet", "unicast")
                },
                BgpFamily::new("inet", "multicast"),
                BgpFamily::new("inet6", "unicast"),
            ],
        }
    }

    /// Running statements of group `G` with three families, two under `inet`
    pub fn family_dump() -> Vec<String> {
        [
            "set protocols bgp group G family inet unicast",
            "set protocols bgp group G family inet unicast accepted-prefix-limit maximum 10",
            "set protocols bgp group G family inet multicast",
            "set protocols bgp group G family inet6 unicast",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
}

/// Common LLDP interface fixtures
pub mod lldp_fixtures {
    use super::*;

    /// LLDP on `name` with PoE negotiation disabled
    pub fn power_negotiation_disabled(name: &str) -> (LldpInterface, LldpInterfaceConfig) {
        (
            LldpInterface::new(name),
            LldpInterfaceConfig {
                power_negotiation_disable: true,
                ..LldpInterfaceConfig::default()
            },
        )
    }
}
