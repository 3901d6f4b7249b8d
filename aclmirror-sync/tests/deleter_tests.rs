mod common;

use aclmirror_store::MirrorStore;
use aclmirror_sync::remote::RemoteError;
use aclmirror_sync::{MassDeleter, MirrorMaintainer};
use aclmirror_types::{Container, ContainerKind, PrincipalGroup};
use common::*;
use std::sync::Arc;

fn make_deleter(mock: &Arc<aclmirror_sync::remote::mock::MockPlatform>) -> (MassDeleter, Arc<MirrorMaintainer>) {
    let maintainer = Arc::new(MirrorMaintainer::new(
        as_remote(mock),
        MirrorStore::open_in_memory().unwrap(),
    ));
    (
        MassDeleter::new(as_remote(mock), Arc::clone(&maintainer), 25),
        maintainer,
    )
}

#[tokio::test]
async fn containers_go_leaves_first_and_failures_are_isolated() {
    let mock = make_mock();
    mock.insert_container(scenario_category());
    mock.insert_container(scenario_channel());
    mock.insert_container(text(CHANNEL_Y, "y", CATEGORY, 1, vec![]));
    mock.insert_container(
        Container::new(CHANNEL_Z, ContainerKind::Voice, "vc")
            .with_parent(CATEGORY)
            .with_position(2),
    );
    mock.fail("delete_container", CHANNEL_Y, RemoteError::permission_denied("Missing Access"));
    let (deleter, maintainer) = make_deleter(&mock);

    let report = deleter.delete_all_containers().await.unwrap();
    assert_eq!(report.deleted, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures.records()[0].to_string(), format!("#y ({CHANNEL_Y}): Missing Access"));

    let deletes = mock.calls_to("delete_container");
    assert_eq!(deletes.len(), 4);
    assert_eq!(deletes.last().unwrap(), &format!("delete_container:{CATEGORY}"));

    // The closing reconcile leaves only the survivor in the cache.
    let cached: Vec<_> = maintainer
        .store()
        .list_containers()
        .unwrap()
        .into_iter()
        .map(|c| c.id.to_string())
        .collect();
    assert_eq!(cached, vec![CHANNEL_Y.to_string()]);
}

#[tokio::test]
async fn category_refetch_failure_is_recorded() {
    let mock = make_mock();
    mock.insert_container(scenario_category());
    mock.insert_container(scenario_channel());
    mock.fail(
        "fetch_container",
        CATEGORY,
        RemoteError::transport("connection reset"),
    );
    let (deleter, _) = make_deleter(&mock);

    let report = deleter.delete_all_containers().await.unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(report.failed, 1);
    assert!(mock.container(CATEGORY).is_some());
}

#[tokio::test]
async fn groups_spare_everyone_and_managed() {
    let mock = make_mock();
    mock.insert_group(PrincipalGroup::new(GROUP_A, "mods", 2));
    mock.insert_group(PrincipalGroup::new(GROUP_B, "bot", 1).managed());
    mock.insert_group(PrincipalGroup::new("600000000000000001", "guests", 1));
    let (deleter, maintainer) = make_deleter(&mock);

    let report = deleter.delete_all_groups().await.unwrap();
    assert_eq!(report.deleted, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);

    assert_eq!(
        mock.calls_to("delete_group"),
        vec![
            "delete_group:600000000000000001".to_string(),
            format!("delete_group:{GROUP_A}"),
        ]
    );
    assert!(mock.group(WORKSPACE).is_some());
    assert!(mock.group(GROUP_B).is_some());

    let cached: Vec<_> = maintainer
        .store()
        .list_groups()
        .unwrap()
        .into_iter()
        .map(|g| g.name)
        .collect();
    assert_eq!(cached, vec!["bot".to_string(), "@everyone".to_string()]);
}

#[tokio::test]
async fn group_failure_is_labelled_by_name_and_id() {
    let mock = make_mock();
    mock.insert_group(PrincipalGroup::new(GROUP_A, "admins", 9));
    mock.fail("delete_group", GROUP_A, RemoteError::permission_denied("Missing Permissions"));
    let (deleter, _) = make_deleter(&mock);

    let report = deleter.delete_all_groups().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures.records()[0].item, format!("admins ({GROUP_A})"));
    assert_eq!(report.failures.records()[0].message, "Missing Permissions");
}
