//! BGP peer group (`protocols bgp group <name>`).

use std::collections::BTreeSet;

use junos_cfg_common::codec::quote;
use junos_cfg_common::{Keyed, KeyedBlocks, Qualifier, Rule, Schema, SubBlock};

use crate::feature::Feature;

/// Locates one BGP group, optionally inside a routing instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgpGroup {
    pub routing_instance: Option<String>,
    pub name: String,
}

impl BgpGroup {
    /// Group in the master instance.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            routing_instance: None,
            name: name.into(),
        }
    }

    /// Group inside `routing_instance`.
    pub fn in_instance(routing_instance: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            routing_instance: Some(routing_instance.into()),
            name: name.into(),
        }
    }
}

impl Feature for BgpGroup {
    type Record = BgpGroupConfig;

    const KIND: &'static str = "bgp-group";

    fn prefix(&self) -> String {
        match &self.routing_instance {
            Some(instance) => format!(
                "routing-instances {} protocols bgp group {} ",
                quote(instance),
                quote(&self.name)
            ),
            None => format!("protocols bgp group {} ", quote(&self.name)),
        }
    }
}

/// Managed statements of a BGP group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgpGroupConfig {
    /// `internal` or `external`.
    pub group_type: String,
    pub description: String,
    pub hold_time: i64,
    pub local_preference: i64,
    pub passive: bool,
    /// Plaintext; stored `$9$`-encoded on the device.
    pub authentication_key: String,
    pub export: Vec<String>,
    pub import: Vec<String>,
    /// Prefixes accepted for dynamic peers.
    pub allow: BTreeSet<String>,
    pub family: Vec<BgpFamily>,
}

impl Default for BgpGroupConfig {
    fn default() -> Self {
        Self {
            group_type: String::new(),
            description: String::new(),
            hold_time: -1,
            local_preference: -1,
            passive: false,
            authentication_key: String::new(),
            export: Vec::new(),
            import: Vec::new(),
            allow: BTreeSet::new(),
            family: Vec::new(),
        }
    }
}

/// One `family <afi> <nlri-type>` block, identified by both tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BgpFamily {
    /// Address family (`inet`, `inet6`, `evpn`).
    pub afi: String,
    /// NLRI type (`unicast`, `multicast`, `signaling`).
    pub nlri_type: String,
    pub accepted_prefix_limit: Option<PrefixLimit>,
}

impl BgpFamily {
    /// Family with the given address family and NLRI type.
    pub fn new(afi: impl Into<String>, nlri_type: impl Into<String>) -> Self {
        Self {
            afi: afi.into(),
            nlri_type: nlri_type.into(),
            accepted_prefix_limit: None,
        }
    }
}

/// `accepted-prefix-limit` settings of a family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixLimit {
    pub maximum: i64,
    /// `teardown`; present without values for the bare statement.
    pub teardown: Option<Teardown>,
}

impl Default for PrefixLimit {
    fn default() -> Self {
        Self {
            maximum: -1,
            teardown: None,
        }
    }
}

/// Session teardown once the prefix limit is exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teardown {
    /// Percentage of `maximum` at which the session is torn down.
    pub limit_threshold: i64,
    /// Minutes before a torn-down session comes back.
    pub idle_timeout: i64,
    /// The session stays down until cleared by hand.
    pub idle_timeout_forever: bool,
}

impl Default for Teardown {
    fn default() -> Self {
        Self {
            limit_threshold: -1,
            idle_timeout: -1,
            idle_timeout_forever: false,
        }
    }
}

static TEARDOWN_RULES: &[Rule<Teardown>] = &[
    Rule::Value {
        sentinel: -1,
        get: |t| t.limit_threshold,
        set: |t, v| t.limit_threshold = v,
    },
    Rule::Int {
        keyword: "idle-timeout",
        sentinel: -1,
        get: |t| t.idle_timeout,
        set: |t, v| t.idle_timeout = v,
    },
    Rule::Flag {
        keyword: "idle-timeout forever",
        get: |t| t.idle_timeout_forever,
        set: |t, v| t.idle_timeout_forever = v,
    },
];

impl Schema for Teardown {
    fn rules() -> &'static [Rule<Self>] {
        TEARDOWN_RULES
    }
}

static PREFIX_LIMIT_TEARDOWN: SubBlock<PrefixLimit, Teardown> = SubBlock {
    keyword: "teardown",
    get: |l| l.teardown.as_ref(),
    get_mut: |l| &mut l.teardown,
};

static PREFIX_LIMIT_RULES: &[Rule<PrefixLimit>] = &[
    Rule::Int {
        keyword: "maximum",
        sentinel: -1,
        get: |l| l.maximum,
        set: |l, v| l.maximum = v,
    },
    Rule::Block(&PREFIX_LIMIT_TEARDOWN),
];

impl Schema for PrefixLimit {
    fn rules() -> &'static [Rule<Self>] {
        PREFIX_LIMIT_RULES
    }
}

static FAMILY_PREFIX_LIMIT: SubBlock<BgpFamily, PrefixLimit> = SubBlock {
    keyword: "accepted-prefix-limit",
    get: |f| f.accepted_prefix_limit.as_ref(),
    get_mut: |f| &mut f.accepted_prefix_limit,
};

static FAMILY_RULES: &[Rule<BgpFamily>] = &[Rule::Block(&FAMILY_PREFIX_LIMIT)];

impl Schema for BgpFamily {
    fn rules() -> &'static [Rule<Self>] {
        FAMILY_RULES
    }

    fn qualifier() -> Option<Qualifier<Self>> {
        Some(Qualifier {
            get: |f| f.nlri_type.as_str(),
            set: |f, v| f.nlri_type = v,
        })
    }
}

impl Keyed for BgpFamily {
    fn key(&self) -> &str {
        &self.afi
    }

    fn set_key(&mut self, key: String) {
        self.afi = key;
    }
}

static GROUP_FAMILY: KeyedBlocks<BgpGroupConfig, BgpFamily> = KeyedBlocks {
    keyword: "family",
    get: |g| g.family.as_slice(),
    get_mut: |g| &mut g.family,
};

static GROUP_RULES: &[Rule<BgpGroupConfig>] = &[
    Rule::Text {
        keyword: "type",
        get: |g| g.group_type.as_str(),
        set: |g, v| g.group_type = v,
    },
    Rule::Text {
        keyword: "description",
        get: |g| g.description.as_str(),
        set: |g, v| g.description = v,
    },
    Rule::Int {
        keyword: "hold-time",
        sentinel: -1,
        get: |g| g.hold_time,
        set: |g, v| g.hold_time = v,
    },
    Rule::Int {
        keyword: "local-preference",
        sentinel: -1,
        get: |g| g.local_preference,
        set: |g, v| g.local_preference = v,
    },
    Rule::Flag {
        keyword: "passive",
        get: |g| g.passive,
        set: |g, v| g.passive = v,
    },
    Rule::Secret {
        keyword: "authentication-key",
        get: |g| g.authentication_key.as_str(),
        set: |g, v| g.authentication_key = v,
    },
    Rule::List {
        keyword: "export",
        get: |g| g.export.as_slice(),
        get_mut: |g| &mut g.export,
    },
    Rule::List {
        keyword: "import",
        get: |g| g.import.as_slice(),
        get_mut: |g| &mut g.import,
    },
    Rule::Set {
        keyword: "allow",
        get: |g| &g.allow,
        get_mut: |g| &mut g.allow,
    },
    Rule::Block(&GROUP_FAMILY),
];

impl Schema for BgpGroupConfig {
    const MARKER: bool = true;

    fn rules() -> &'static [Rule<Self>] {
        GROUP_RULES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use junos_cfg_common::builder;
    use junos_cfg_common::reconstruct::{reconstruct, reconstruct_keyed};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn int_or_sentinel() -> impl Strategy<Value = i64> {
        prop_oneof![Just(-1i64), 0i64..=65535]
    }

    fn words() -> impl Strategy<Value = String> {
        "[A-Za-z0-9._/:-]{1,8}( [A-Za-z0-9._/:-]{1,8}){0,2}"
    }

    fn text() -> impl Strategy<Value = String> {
        prop_oneof![Just(String::new()), words()]
    }

    fn teardown() -> impl Strategy<Value = Teardown> {
        (int_or_sentinel(), int_or_sentinel(), any::<bool>()).prop_map(
            |(limit_threshold, idle_timeout, idle_timeout_forever)| Teardown {
                limit_threshold,
                idle_timeout,
                idle_timeout_forever,
            },
        )
    }

    fn prefix_limit() -> impl Strategy<Value = PrefixLimit> {
        (int_or_sentinel(), proptest::option::of(teardown()))
            .prop_map(|(maximum, teardown)| PrefixLimit { maximum, teardown })
    }

    fn families() -> impl Strategy<Value = Vec<BgpFamily>> {
        let afi = prop_oneof![Just("inet"), Just("inet6"), Just("inet-vpn"), Just("evpn")];
        let nlri = prop_oneof![
            Just("unicast"),
            Just("multicast"),
            Just("flow"),
            Just("signaling")
        ];
        proptest::collection::btree_map((afi, nlri), proptest::option::of(prefix_limit()), 0..6)
            .prop_map(|blocks| {
                blocks
                    .into_iter()
                    .map(|((afi, nlri), limit)| BgpFamily {
                        accepted_prefix_limit: limit,
                        ..BgpFamily::new(afi, nlri)
                    })
                    .collect()
            })
    }

    fn group_config() -> impl Strategy<Value = BgpGroupConfig> {
        (
            (text(), text(), int_or_sentinel(), int_or_sentinel(), any::<bool>()),
            (
                prop_oneof![Just(String::new()), "[ -~]{1,16}"],
                proptest::collection::vec(words(), 0..4),
                proptest::collection::vec(words(), 0..4),
                proptest::collection::btree_set("[0-9]{1,3}(\\.[0-9]{1,3}){3}/[0-9]{1,2}", 0..4),
                families(),
            ),
        )
            .prop_map(
                |(
                    (group_type, description, hold_time, local_preference, passive),
                    (authentication_key, export, import, allow, family),
                )| BgpGroupConfig {
                    group_type,
                    description,
                    hold_time,
                    local_preference,
                    passive,
                    authentication_key,
                    export,
                    import,
                    allow,
                    family,
                },
            )
    }

    proptest! {
        #[test]
        fn prop_group_round_trips(config in group_config()) {
            let group = BgpGroup::in_instance("CUST-A", "G");
            let lines = group.set_lines(&config);
            prop_assert!(builder::validate(&config).is_ok());
            let back: BgpGroupConfig =
                reconstruct(&lines, &format!("set {}", group.prefix())).unwrap();
            prop_assert_eq!(back, config);
        }

        #[test]
        fn prop_duplicated_dump_keeps_blocks_unique(config in group_config()) {
            let relative = builder::build("", &config);
            let doubled: Vec<&String> = relative.iter().chain(relative.iter()).collect();

            let back = BgpGroup::parse(&doubled).unwrap();
            prop_assert_eq!(&back.family, &config.family);
            prop_assert_eq!(&back.allow, &config.allow);
            prop_assert_eq!(back.hold_time, config.hold_time);
            prop_assert_eq!(&back.authentication_key, &config.authentication_key);

            let families: Vec<BgpFamily> = reconstruct_keyed(&doubled, "set ", "family").unwrap();
            prop_assert_eq!(families, config.family);
        }
    }

    #[test]
    fn test_prefix() {
        assert_eq!(BgpGroup::new("G").prefix(), "protocols bgp group G ");
        assert_eq!(
            BgpGroup::in_instance("CUST-A", "peers v4").prefix(),
            "routing-instances CUST-A protocols bgp group \"peers v4\" "
        );
        assert_eq!(BgpGroup::new("G").path(), "protocols bgp group G");
    }

    #[test]
    fn test_sentinels_are_omitted() {
        let group = BgpGroup::new("G");
        let config = BgpGroupConfig {
            hold_time: 30,
            export: vec!["POL1".to_string(), "POL2".to_string()],
            ..BgpGroupConfig::default()
        };
        let lines = group.set_lines(&config);
        assert_eq!(
            lines,
            vec![
                "set protocols bgp group G ",
                "set protocols bgp group G hold-time 30",
                "set protocols bgp group G export POL1",
                "set protocols bgp group G export POL2",
            ]
        );

        let back: BgpGroupConfig = reconstruct(&lines, "set protocols bgp group G ").unwrap();
        assert_eq!(back.local_preference, -1);
        assert_eq!(back, config);
    }

    #[test]
    fn test_family_blocks_from_dump() {
        let lines = [
            "family inet unicast",
            "family inet unicast accepted-prefix-limit maximum 10",
            "family inet6 unicast",
        ];
        let families: Vec<BgpFamily> = reconstruct_keyed(&lines, "", "family").unwrap();
        assert_eq!(families.len(), 2);
        assert_eq!(families[0].afi, "inet");
        assert_eq!(families[1].afi, "inet6");
        assert_eq!(
            families[0].accepted_prefix_limit.as_ref().map(|l| l.maximum),
            Some(10)
        );
        assert_eq!(families[1].accepted_prefix_limit, None);
    }

    #[test]
    fn test_full_round_trip() {
        let group = BgpGroup::in_instance("CUST-A", "transit");
        let config = BgpGroupConfig {
            group_type: "external".to_string(),
            description: "transit peers".to_string(),
            hold_time: 0,
            local_preference: 200,
            passive: true,
            authentication_key: "lab key".to_string(),
            export: vec!["EXPORT-B".to_string(), "EXPORT-A".to_string()],
            import: vec!["IMPORT".to_string()],
            allow: ["192.0.2.0/24", "198.51.100.0/24"]
                .into_iter()
                .map(String::from)
                .collect(),
            family: vec![
                BgpFamily {
                    accepted_prefix_limit: Some(PrefixLimit {
                        maximum: 1000,
                        teardown: Some(Teardown {
                            limit_threshold: 80,
                            idle_timeout: 30,
                            idle_timeout_forever: false,
                        }),
                    }),
                    ..BgpFamily::new("inet", "unicast")
                },
                BgpFamily {
                    accepted_prefix_limit: Some(PrefixLimit {
                        maximum: 50,
                        teardown: Some(Teardown::default()),
                    }),
                    ..BgpFamily::new("inet", "multicast")
                },
                BgpFamily {
                    accepted_prefix_limit: Some(PrefixLimit::default()),
                    ..BgpFamily::new("inet6", "unicast")
                },
                BgpFamily::new("evpn", "signaling"),
            ],
        };
        let lines = group.set_lines(&config);
        assert!(lines
            .iter()
            .any(|l| l.ends_with("unicast accepted-prefix-limit teardown 80")));
        assert!(lines
            .iter()
            .any(|l| l.ends_with("unicast accepted-prefix-limit teardown idle-timeout 30")));
        assert!(lines
            .iter()
            .any(|l| l.ends_with("multicast accepted-prefix-limit teardown")));
        assert!(lines.iter().all(|l| !l.contains("lab key")));

        let back: BgpGroupConfig = reconstruct(&lines, &format!("set {}", group.prefix())).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_parse_relative_dump() {
        let dump = [
            "set type internal",
            "set local-preference 150",
            "set family inet unicast",
            "set family inet unicast accepted-prefix-limit maximum 10",
            "set family inet6 unicast",
            "set neighbor 192.0.2.1 description unmanaged",
        ];
        let config = BgpGroup::parse(&dump).unwrap();
        assert_eq!(config.group_type, "internal");
        assert_eq!(config.local_preference, 150);
        assert_eq!(config.hold_time, -1);
        assert_eq!(config.family.len(), 2);
    }

    #[test]
    fn test_delete_lines() {
        let group = BgpGroup::new("G");
        assert_eq!(group.delete_lines(), vec!["delete protocols bgp group G"]);
        let managed = group.delete_managed_lines();
        assert_eq!(managed.len(), GROUP_RULES.len());
        assert_eq!(managed[0], "delete protocols bgp group G type");
        assert_eq!(managed[9], "delete protocols bgp group G family");
    }

    #[test]
    fn test_two_nlri_types_under_one_family() {
        let dump = ["set family inet unicast", "set family inet multicast"];
        let config = BgpGroup::parse(&dump).unwrap();
        assert_eq!(
            config.family,
            vec![
                BgpFamily::new("inet", "unicast"),
                BgpFamily::new("inet", "multicast"),
            ]
        );
        builder::validate(&config).unwrap();

        let group = BgpGroup::new("G");
        let lines = group.set_lines(&config);
        assert_eq!(
            lines,
            vec![
                "set protocols bgp group G ",
                "set protocols bgp group G family inet unicast",
                "set protocols bgp group G family inet multicast",
            ]
        );
    }

    #[test]
    fn test_prefix_limit_per_nlri_type() {
        let dump = [
            "set family inet unicast accepted-prefix-limit maximum 10",
            "set family inet multicast accepted-prefix-limit maximum 20",
            "set family inet unicast accepted-prefix-limit teardown 90",
        ];
        let config = BgpGroup::parse(&dump).unwrap();
        assert_eq!(config.family.len(), 2);
        assert_eq!(config.family[0].nlri_type, "unicast");
        assert_eq!(
            config.family[0].accepted_prefix_limit,
            Some(PrefixLimit {
                maximum: 10,
                teardown: Some(Teardown {
                    limit_threshold: 90,
                    ..Teardown::default()
                }),
            })
        );
        assert_eq!(
            config.family[1].accepted_prefix_limit,
            Some(PrefixLimit {
                maximum: 20,
                teardown: None,
            })
        );
    }

    #[test]
    fn test_duplicate_family_pair_is_rejected() {
        let config = BgpGroupConfig {
            family: vec![
                BgpFamily::new("inet", "unicast"),
                BgpFamily::new("inet", "unicast"),
            ],
            ..BgpGroupConfig::default()
        };
        let err = builder::validate(&config).unwrap_err();
        assert!(err.to_string().contains("inet unicast"), "{}", err);
    }

    fn family_with_teardown(teardown: Teardown) -> BgpGroupConfig {
        BgpGroupConfig {
            family: vec![BgpFamily {
                accepted_prefix_limit: Some(PrefixLimit {
                    maximum: -1,
                    teardown: Some(teardown),
                }),
                ..BgpFamily::new("inet", "unicast")
            }],
            ..BgpGroupConfig::default()
        }
    }

    #[test]
    fn test_bare_teardown() {
        let config =
            BgpGroup::parse(&["set family inet unicast accepted-prefix-limit teardown"]).unwrap();
        assert_eq!(config, family_with_teardown(Teardown::default()));

        let group = BgpGroup::new("G");
        let lines = group.set_lines(&config);
        assert_eq!(
            lines.last().map(String::as_str),
            Some("set protocols bgp group G family inet unicast accepted-prefix-limit teardown")
        );
        let back: BgpGroupConfig = reconstruct(&lines, "set protocols bgp group G ").unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_teardown_idle_timeout_forever() {
        let config = BgpGroup::parse(&[
            "set family inet unicast accepted-prefix-limit teardown idle-timeout forever",
        ])
        .unwrap();
        let expected = family_with_teardown(Teardown {
            idle_timeout_forever: true,
            ..Teardown::default()
        });
        assert_eq!(config, expected);

        let group = BgpGroup::new("G");
        let lines = group.set_lines(&config);
        assert!(lines.iter().any(|l| l.ends_with("teardown idle-timeout forever")));
        let back: BgpGroupConfig = reconstruct(&lines, "set protocols bgp group G ").unwrap();
        assert_eq!(back, expected);
    }

    #[test]
    fn test_teardown_threshold_and_timeout_on_one_line() {
        let config = BgpGroup::parse(&[
            "set family inet unicast accepted-prefix-limit teardown 80 idle-timeout 30",
        ])
        .unwrap();
        assert_eq!(
            config,
            family_with_teardown(Teardown {
                limit_threshold: 80,
                idle_timeout: 30,
                idle_timeout_forever: false,
            })
        );
    }
}
