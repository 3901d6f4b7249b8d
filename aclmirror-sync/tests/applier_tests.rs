mod common;

use aclmirror_sync::remote::RemoteError;
use aclmirror_sync::{canonicalize, ApplyReason, EngineError, OverrideApplier};
use aclmirror_types::ContainerId;
use common::{as_remote, make_mock, ow, scenario_category, scenario_channel, CHANNEL_X, GROUP_A};

#[tokio::test]
async fn second_apply_is_a_no_op() {
    let mock = make_mock();
    mock.insert_container(scenario_channel());
    let applier = OverrideApplier::new(as_remote(&mock));
    let desired = canonicalize(&scenario_category().overrides).unwrap();
    let id = ContainerId::new(CHANNEL_X);

    let first = applier.apply(&id, &desired, false).await.unwrap();
    assert!(first.changed);
    assert_eq!(first.reason, ApplyReason::Updated);

    let second = applier.apply(&id, &desired, false).await.unwrap();
    assert!(!second.changed);
    assert_eq!(second.reason, ApplyReason::AlreadyMatches);
    assert_eq!(mock.calls_to("set_overrides").len(), 1);
}

#[tokio::test]
async fn dry_run_leaves_remote_untouched() {
    let mock = make_mock();
    mock.insert_container(scenario_channel());
    let applier = OverrideApplier::new(as_remote(&mock));
    let desired = canonicalize(&scenario_category().overrides).unwrap();
    let before = mock.container(CHANNEL_X).unwrap().overrides;

    let outcome = applier
        .apply(&ContainerId::new(CHANNEL_X), &desired, true)
        .await
        .unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.reason, ApplyReason::WouldChange);
    assert!(mock.calls_to("set_overrides").is_empty());
    assert_eq!(mock.container(CHANNEL_X).unwrap().overrides, before);
}

#[tokio::test]
async fn reordered_remote_list_already_matches() {
    let mock = make_mock();
    let mut channel = scenario_channel();
    let mut reversed = scenario_category().overrides;
    reversed.reverse();
    channel.overrides = reversed;
    mock.insert_container(channel);

    let desired = canonicalize(&scenario_category().overrides).unwrap();
    let outcome = OverrideApplier::new(as_remote(&mock))
        .apply(&ContainerId::new(CHANNEL_X), &desired, false)
        .await
        .unwrap();
    assert_eq!(outcome.reason, ApplyReason::AlreadyMatches);
}

#[tokio::test]
async fn missing_container_is_not_found() {
    let mock = make_mock();
    let desired = canonicalize(&[ow(GROUP_A, &["ViewChannel"], &[])]).unwrap();
    let err = OverrideApplier::new(as_remote(&mock))
        .apply(&ContainerId::new(CHANNEL_X), &desired, false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn remote_rejection_propagates() {
    let mock = make_mock();
    mock.insert_container(scenario_channel());
    mock.fail("set_overrides", CHANNEL_X, RemoteError::permission_denied("Missing Permissions"));
    let desired = canonicalize(&scenario_category().overrides).unwrap();

    let err = OverrideApplier::new(as_remote(&mock))
        .apply(&ContainerId::new(CHANNEL_X), &desired, false)
        .await
        .unwrap_err();
    match err {
        EngineError::Remote(e) => assert_eq!(e.message, "Missing Permissions"),
        other => panic!("unexpected error: {other}"),
    }
}
