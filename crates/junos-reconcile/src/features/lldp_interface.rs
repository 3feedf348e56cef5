//! LLDP interface (`protocols lldp interface <name>`).

use junos_cfg_common::codec::quote;
use junos_cfg_common::{Rule, Schema};

use crate::feature::Feature;

/// Locates the LLDP settings of one interface (or `all`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LldpInterface {
    pub name: String,
}

impl LldpInterface {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Feature for LldpInterface {
    type Record = LldpInterfaceConfig;

    const KIND: &'static str = "lldp-interface";

    fn prefix(&self) -> String {
        format!("protocols lldp interface {} ", quote(&self.name))
    }
}

/// Managed statements of an LLDP interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LldpInterfaceConfig {
    pub disable: bool,
    pub power_negotiation_disable: bool,
    pub enable: bool,
}

static LLDP_INTERFACE_RULES: &[Rule<LldpInterfaceConfig>] = &[
    Rule::Flag {
        keyword: "disable",
        get: |c| c.disable,
        set: |c, v| c.disable = v,
    },
    Rule::Flag {
        keyword: "power-negotiation disable",
        get: |c| c.power_negotiation_disable,
        set: |c, v| c.power_negotiation_disable = v,
    },
    Rule::Flag {
        keyword: "enable",
        get: |c| c.enable,
        set: |c, v| c.enable = v,
    },
];

impl Schema for LldpInterfaceConfig {
    const MARKER: bool = true;

    fn rules() -> &'static [Rule<Self>] {
        LLDP_INTERFACE_RULES
    }
}
