//! Create/update/delete/read flows through the coordinator

use junos_cfg_test::{
    bgp_fixtures, config_fixtures, coordinator, lldp_fixtures, DeviceVerifier, EventKind,
    MockDevice, TEST_HOSTNAME,
};
use junos_reconcile::features::{BgpGroup, BgpGroupConfig, LldpInterface};
use junos_reconcile::{ApplyOutcome, Feature, Presence, ReconcileError};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_create_commits_and_releases_everything() {
    let device = MockDevice::new(TEST_HOSTNAME);
    let coordinator = coordinator(&device, config_fixtures::plain()).unwrap();
    let cancel = CancellationToken::new();

    let report = coordinator
        .create(
            &bgp_fixtures::group_g(),
            &bgp_fixtures::hold_time_and_exports(),
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, ApplyOutcome::Committed);
    assert_eq!(
        report.lines,
        vec![
            "set protocols bgp group G ",
            "set protocols bgp group G hold-time 30",
            "set protocols bgp group G export POL1",
            "set protocols bgp group G export POL2",
        ]
    );
    assert!(report.warnings.is_empty());

    let verifier = DeviceVerifier::new(&device);
    verifier.assert_idle().unwrap();
    verifier
        .assert_statements(&[
            "protocols bgp group G hold-time 30",
            "protocols bgp group G export POL1",
            "protocols bgp group G export POL2",
        ])
        .unwrap();
    assert!(!device
        .running()
        .iter()
        .any(|s| s.contains("local-preference")));
    verifier
        .assert_event_order(&[
            EventKind::Connect,
            EventKind::Lock,
            EventKind::Command(
                "show configuration protocols bgp group G | display set".to_string(),
            ),
            EventKind::Load(report.lines.clone()),
            EventKind::Commit {
                confirm_minutes: None,
            },
            EventKind::Unlock,
            EventKind::Close,
        ])
        .unwrap();
}

#[tokio::test]
async fn test_create_existing_fails_without_changes() {
    let device = MockDevice::new(TEST_HOSTNAME);
    device.load_running(&["set protocols bgp group G hold-time 60"]);
    let coordinator = coordinator(&device, config_fixtures::plain()).unwrap();

    let err = coordinator
        .create(
            &bgp_fixtures::group_g(),
            &bgp_fixtures::hold_time_and_exports(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        ReconcileError::ExistenceMismatch { path, expected } => {
            assert_eq!(path, "protocols bgp group G");
            assert_eq!(expected, Presence::Absent);
        }
        other => panic!("expected ExistenceMismatch, got {:?}", other),
    }
    assert_eq!(device.running(), vec!["protocols bgp group G hold-time 60"]);
    assert_eq!(device.count_events(|k| matches!(k, EventKind::Load(_))), 0);
    DeviceVerifier::new(&device).assert_idle().unwrap();
}

#[tokio::test]
async fn test_update_replaces_managed_statements() {
    let device = MockDevice::new(TEST_HOSTNAME);
    device.load_running(&[
        "set protocols bgp group G",
        "set protocols bgp group G hold-time 60",
        "set protocols bgp group G local-preference 200",
        "set protocols bgp group G export OLD",
        "set protocols bgp group G neighbor 192.0.2.1",
    ]);
    let coordinator = coordinator(&device, config_fixtures::plain()).unwrap();

    let report = coordinator
        .update(
            &bgp_fixtures::group_g(),
            &bgp_fixtures::hold_time_and_exports(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.outcome, ApplyOutcome::Committed);
    assert!(report.lines[0].starts_with("delete protocols bgp group G "));

    let verifier = DeviceVerifier::new(&device);
    verifier.assert_idle().unwrap();
    verifier
        .assert_statements(&[
            "protocols bgp group G hold-time 30",
            "protocols bgp group G export POL1",
            "protocols bgp group G export POL2",
            // Unmanaged statements survive
            "protocols bgp group G neighbor 192.0.2.1",
        ])
        .unwrap();
    verifier
        .assert_path_absent("protocols bgp group G local-preference")
        .unwrap();
    verifier
        .assert_path_absent("protocols bgp group G export OLD")
        .unwrap();
    verifier
        .assert_path_absent("protocols bgp group G hold-time 60")
        .unwrap();
}

#[tokio::test]
async fn test_delete_removes_subtree() {
    let device = MockDevice::new(TEST_HOSTNAME);
    device.load_running(&[
        "set protocols bgp group G hold-time 30",
        "set protocols bgp group GX hold-time 30",
    ]);
    let coordinator = coordinator(&device, config_fixtures::plain()).unwrap();

    let report = coordinator
        .delete(&bgp_fixtures::group_g(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.outcome, ApplyOutcome::Committed);
    assert_eq!(report.lines, vec!["delete protocols bgp group G"]);
    assert!(report.warnings.is_empty());

    let verifier = DeviceVerifier::new(&device);
    verifier.assert_idle().unwrap();
    verifier.assert_path_absent("protocols bgp group G").unwrap();
    verifier
        .assert_statements(&["protocols bgp group GX hold-time 30"])
        .unwrap();
}

#[tokio::test]
async fn test_delete_absent_is_not_an_error() {
    let device = MockDevice::new(TEST_HOSTNAME);
    let coordinator = coordinator(&device, config_fixtures::plain()).unwrap();

    let report = coordinator
        .delete(&bgp_fixtures::group_g(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.outcome, ApplyOutcome::AlreadyAbsent);
    assert!(report.lines.is_empty());

    assert_eq!(device.count_events(|k| matches!(k, EventKind::Commit { .. })), 0);
    assert_eq!(device.count_events(|k| matches!(k, EventKind::Load(_))), 0);
    DeviceVerifier::new(&device).assert_idle().unwrap();
}

#[tokio::test]
async fn test_read_round_trips_created_record() {
    let device = MockDevice::new(TEST_HOSTNAME);
    let coordinator = coordinator(&device, config_fixtures::plain()).unwrap();
    let cancel = CancellationToken::new();
    let group = BgpGroup::in_instance("CUST-A", "transit");
    let desired = bgp_fixtures::transit();

    coordinator.create(&group, &desired, &cancel).await.unwrap();
    // The key is stored encoded
    assert!(!device.running().iter().any(|s| s.contains("transit-md5")));

    let back = coordinator.read(&group, &cancel).await.unwrap();
    assert_eq!(back, Some(desired));
    DeviceVerifier::new(&device).assert_idle().unwrap();
    // Reads never lock
    assert_eq!(device.count_events(|k| *k == EventKind::Lock), 1);
}

#[tokio::test]
async fn test_read_absent_is_none() {
    let device = MockDevice::new(TEST_HOSTNAME);
    let coordinator = coordinator(&device, config_fixtures::plain()).unwrap();

    let back = coordinator
        .read(&LldpInterface::new("ge-0/0/1"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(back, None);
    DeviceVerifier::new(&device).assert_idle().unwrap();
}

#[tokio::test]
async fn test_read_duplicated_dump_keeps_families_unique() {
    let device = MockDevice::new(TEST_HOSTNAME);
    device.load_running(&bgp_fixtures::family_dump());
    device.inject(|f| f.duplicate_dump = true);
    let coordinator = coordinator(&device, config_fixtures::plain()).unwrap();

    let config: BgpGroupConfig = coordinator
        .read(&bgp_fixtures::group_g(), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(config.family.len(), 3);
    assert_eq!(config.family[0].afi, "inet");
    assert_eq!(config.family[0].nlri_type, "unicast");
    assert_eq!(
        config.family[0]
            .accepted_prefix_limit
            .as_ref()
            .map(|l| l.maximum),
        Some(10)
    );
    assert_eq!(config.family[1].afi, "inet");
    assert_eq!(config.family[1].nlri_type, "multicast");
    assert_eq!(config.family[2].afi, "inet6");
}

#[tokio::test]
async fn test_update_keeps_every_nlri_type_of_a_family() {
    let device = MockDevice::new(TEST_HOSTNAME);
    device.load_running(&bgp_fixtures::family_dump());
    let coordinator = coordinator(&device, config_fixtures::plain()).unwrap();
    let cancel = CancellationToken::new();
    let group = bgp_fixtures::group_g();

    let mut desired = coordinator.read(&group, &cancel).await.unwrap().unwrap();
    desired.hold_time = 45;
    coordinator.update(&group, &desired, &cancel).await.unwrap();

    assert!(device.has_statement("protocols bgp group G hold-time 45"));
    assert!(device.has_statement(
        "protocols bgp group G family inet unicast accepted-prefix-limit maximum 10"
    ));
    assert!(device.has_statement("protocols bgp group G family inet multicast"));
    assert!(device.has_statement("protocols bgp group G family inet6 unicast"));
    assert_eq!(coordinator.read(&group, &cancel).await.unwrap(), Some(desired));
    DeviceVerifier::new(&device).assert_idle().unwrap();
}

#[tokio::test]
async fn test_read_reports_corrupt_statement() {
    let device = MockDevice::new(TEST_HOSTNAME);
    device.load_running(&["set protocols bgp group G hold-time soon"]);
    let coordinator = coordinator(&device, config_fixtures::plain()).unwrap();

    let err = coordinator
        .read(&bgp_fixtures::group_g(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Parse(_)));
    assert!(err.to_string().contains("hold-time soon"));
    DeviceVerifier::new(&device).assert_idle().unwrap();
}

#[tokio::test]
async fn test_exists() {
    let device = MockDevice::new(TEST_HOSTNAME);
    device.load_running(&["set protocols lldp interface ge-0/0/1 disable"]);
    let coordinator = coordinator(&device, config_fixtures::plain()).unwrap();
    let cancel = CancellationToken::new();

    assert!(coordinator
        .exists(&LldpInterface::new("ge-0/0/1"), &cancel)
        .await
        .unwrap());
    assert!(!coordinator
        .exists(&LldpInterface::new("ge-0/0/2"), &cancel)
        .await
        .unwrap());
    DeviceVerifier::new(&device).assert_idle().unwrap();
}

#[tokio::test]
async fn test_lldp_lifecycle() {
    let device = MockDevice::new(TEST_HOSTNAME);
    let coordinator = coordinator(&device, config_fixtures::plain()).unwrap();
    let cancel = CancellationToken::new();
    let (interface, config) = lldp_fixtures::power_negotiation_disabled("ge-0/0/4");

    coordinator.create(&interface, &config, &cancel).await.unwrap();
    assert!(device.has_statement("protocols lldp interface ge-0/0/4 power-negotiation disable"));
    assert_eq!(
        coordinator.read(&interface, &cancel).await.unwrap(),
        Some(config)
    );

    coordinator.delete(&interface, &cancel).await.unwrap();
    assert!(!device.has_path(&interface.path()));
    assert_eq!(coordinator.read(&interface, &cancel).await.unwrap(), None);
    DeviceVerifier::new(&device).assert_idle().unwrap();
}

#[tokio::test]
async fn test_commit_warnings_are_reported() {
    let device = MockDevice::new(TEST_HOSTNAME);
    device.inject(|f| {
        f.commit_warnings = vec!["warning: statement has no contents; ignored".to_string()]
    });
    let coordinator = coordinator(&device, config_fixtures::plain()).unwrap();

    let report = coordinator
        .create(
            &bgp_fixtures::group_g(),
            &bgp_fixtures::hold_time_and_exports(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.outcome, ApplyOutcome::Committed);
    assert_eq!(
        report.warnings,
        vec!["warning: statement has no contents; ignored"]
    );
}

#[tokio::test]
async fn test_post_commit_drift_is_a_warning() {
    let device = MockDevice::new(TEST_HOSTNAME);
    device.inject(|f| f.silent_commit = true);
    let coordinator = coordinator(&device, config_fixtures::plain()).unwrap();

    let report = coordinator
        .create(
            &bgp_fixtures::group_g(),
            &bgp_fixtures::hold_time_and_exports(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.outcome, ApplyOutcome::Committed);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("protocols bgp group G"));
    assert!(report.warnings[0].contains("present"));
    DeviceVerifier::new(&device).assert_idle().unwrap();
}

#[tokio::test]
async fn test_commit_log_message() {
    let device = MockDevice::new(TEST_HOSTNAME);
    let mut config = config_fixtures::plain();
    config.commit_log_message = "ticket NET-1234".to_string();
    let coordinator = coordinator(&device, config).unwrap();

    coordinator
        .delete(&LldpInterface::new("all"), &CancellationToken::new())
        .await
        .unwrap();
    assert!(device.commit_log().is_empty());

    let (interface, lldp) = lldp_fixtures::power_negotiation_disabled("all");
    coordinator
        .create(&interface, &lldp, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(device.commit_log(), vec!["ticket NET-1234"]);
}

#[tokio::test]
async fn test_invalid_record_never_connects() {
    let device = MockDevice::new(TEST_HOSTNAME);
    let coordinator = coordinator(&device, config_fixtures::plain()).unwrap();
    let record = BgpGroupConfig {
        description: "first\nsecond".to_string(),
        ..BgpGroupConfig::default()
    };

    let err = coordinator
        .create(&bgp_fixtures::group_g(), &record, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Parse(_)));
    assert!(device.events().is_empty());
}

#[tokio::test]
async fn test_dry_run_create_writes_artifact_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dry-run.set");
    let device = MockDevice::new(TEST_HOSTNAME);
    let coordinator = coordinator(&device, config_fixtures::dry_run(&path, false, false)).unwrap();
    let cancel = CancellationToken::new();

    let report = coordinator
        .create(
            &bgp_fixtures::group_g(),
            &bgp_fixtures::hold_time_and_exports(),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(report.outcome, ApplyOutcome::WrittenToArtifact);
    assert!(device.events().is_empty());
    assert!(device.running().is_empty());

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        written,
        "set protocols bgp group G \n\
         set protocols bgp group G hold-time 30\n\
         set protocols bgp group G export POL1\n\
         set protocols bgp group G export POL2\n"
    );
}

#[tokio::test]
async fn test_dry_run_update_goes_live_unless_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dry-run.set");
    let device = MockDevice::new(TEST_HOSTNAME);
    device.load_running(&["set protocols bgp group G hold-time 60"]);
    let cancel = CancellationToken::new();

    let live = coordinator(&device, config_fixtures::dry_run(&path, false, false)).unwrap();
    let report = live
        .update(
            &bgp_fixtures::group_g(),
            &bgp_fixtures::hold_time_and_exports(),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(report.outcome, ApplyOutcome::Committed);
    assert!(device.has_statement("protocols bgp group G hold-time 30"));
    assert!(!path.exists());

    let report = live.delete(&bgp_fixtures::group_g(), &cancel).await.unwrap();
    assert_eq!(report.outcome, ApplyOutcome::Committed);
    assert!(!device.has_path("protocols bgp group G"));
}

#[tokio::test]
async fn test_dry_run_update_and_delete_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dry-run.set");
    let device = MockDevice::new(TEST_HOSTNAME);
    device.load_running(&["set protocols bgp group G hold-time 60"]);
    let coordinator = coordinator(&device, config_fixtures::dry_run(&path, true, true)).unwrap();
    let cancel = CancellationToken::new();
    let group = bgp_fixtures::group_g();

    let update = coordinator
        .update(&group, &bgp_fixtures::hold_time_and_exports(), &cancel)
        .await
        .unwrap();
    let delete = coordinator.delete(&group, &cancel).await.unwrap();
    assert_eq!(update.outcome, ApplyOutcome::WrittenToArtifact);
    assert_eq!(delete.outcome, ApplyOutcome::WrittenToArtifact);

    assert!(device.events().is_empty());
    assert_eq!(device.running(), vec!["protocols bgp group G hold-time 60"]);

    let written = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), update.lines.len() + 1);
    assert_eq!(lines.last(), Some(&"delete protocols bgp group G"));
}
