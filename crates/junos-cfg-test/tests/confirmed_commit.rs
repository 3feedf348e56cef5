//! Confirmed commit timing

use std::time::Duration;

use junos_cfg_test::{
    bgp_fixtures, config_fixtures, coordinator, DeviceVerifier, EventKind, MockDevice,
    TEST_HOSTNAME,
};
use junos_reconcile::{ApplyOutcome, CommitMode, ConfirmedCommit, EngineConfig};
use pretty_assertions::assert_eq;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn is_confirmed_commit(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Commit { confirm_minutes: Some(_) })
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_waits_share_of_timeout() {
    let device = MockDevice::new(TEST_HOSTNAME);
    let coordinator = coordinator(&device, config_fixtures::confirmed(10, 90)).unwrap();

    let report = coordinator
        .create(
            &bgp_fixtures::group_g(),
            &bgp_fixtures::hold_time_and_exports(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.outcome, ApplyOutcome::Committed);

    let committed = device.first_event_at(is_confirmed_commit).unwrap();
    let confirmed = device
        .first_event_at(|k| *k == EventKind::CommitCheck)
        .unwrap();
    let wait = confirmed - committed;
    assert!(wait >= Duration::from_secs(540), "wait {:?}", wait);
    assert!(wait < Duration::from_secs(600), "wait {:?}", wait);

    assert_eq!(
        device.count_events(|k| *k == EventKind::Commit {
            confirm_minutes: Some(10)
        }),
        1
    );
    assert!(!device.confirm_pending());
    DeviceVerifier::new(&device).assert_idle().unwrap();
    DeviceVerifier::new(&device)
        .assert_event_order(&[
            EventKind::Lock,
            EventKind::Commit {
                confirm_minutes: Some(10),
            },
            EventKind::CommitCheck,
            EventKind::Unlock,
            EventKind::Close,
        ])
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_lock_held_until_confirmation() {
    let device = MockDevice::new(TEST_HOSTNAME);
    let coordinator = coordinator(&device, config_fixtures::confirmed(2, 50)).unwrap();

    let probe = device.clone();
    let watcher = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        (probe.lock_holder(), probe.confirm_pending())
    });

    let started = Instant::now();
    coordinator
        .create(
            &bgp_fixtures::group_g(),
            &bgp_fixtures::hold_time_and_exports(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(started.elapsed(), Duration::from_secs(60));

    let (holder, pending) = watcher.await.unwrap();
    assert!(holder.is_some());
    assert!(pending);
    DeviceVerifier::new(&device).assert_unlocked().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_commit_survives_deadline() {
    let device = MockDevice::new(TEST_HOSTNAME);
    let coordinator = coordinator(&device, config_fixtures::confirmed(10, 90)).unwrap();

    coordinator
        .create(
            &bgp_fixtures::group_g(),
            &bgp_fixtures::hold_time_and_exports(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert!(device.has_statement("protocols bgp group G hold-time 30"));
    assert_eq!(device.count_events(|k| *k == EventKind::Rollback), 0);
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_delete() {
    let device = MockDevice::new(TEST_HOSTNAME);
    device.load_running(&["set protocols bgp group G hold-time 30"]);
    let coordinator = coordinator(&device, config_fixtures::confirmed(1, 90)).unwrap();

    let started = Instant::now();
    let report = coordinator
        .delete(&bgp_fixtures::group_g(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.outcome, ApplyOutcome::Committed);
    assert_eq!(started.elapsed(), Duration::from_secs(54));
    assert!(!device.has_path("protocols bgp group G"));
    DeviceVerifier::new(&device).assert_idle().unwrap();
}

#[test]
fn test_commit_mode_from_yaml() {
    let config = EngineConfig::from_yaml_str(
        "commit_confirmed_minutes: 5\ncommit_confirmed_wait_percent: 80\n",
    )
    .unwrap();
    assert_eq!(
        config.commit_mode(),
        CommitMode::Confirmed(ConfirmedCommit {
            timeout_minutes: 5,
            verify_wait_percent: 80,
        })
    );

    let plain = EngineConfig::from_yaml_str("retry_count: 3\n").unwrap();
    assert_eq!(plain.commit_mode(), CommitMode::Plain);
}
