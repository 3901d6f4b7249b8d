mod common;

use aclmirror_sync::remote::RemoteError;
use aclmirror_sync::{parse_principal_ids, AssignAction, EngineError, RoleAssigner};
use aclmirror_types::{GroupId, Principal, PrincipalGroup, PrincipalId};
use common::*;

const ALICE: &str = "500000000000000001";
const BOB: &str = "500000000000000002";
const GHOST: &str = "500000000000000009";

fn seeded() -> std::sync::Arc<aclmirror_sync::remote::mock::MockPlatform> {
    let mock = make_mock();
    mock.insert_group(PrincipalGroup::new(GROUP_A, "mods", 2));
    mock.insert_principal(Principal::new(ALICE, "alice"));
    mock.insert_principal(Principal::new(BOB, "bob"));
    mock
}

fn ids(list: &[&str]) -> Vec<PrincipalId> {
    list.iter().map(|s| PrincipalId::new(*s)).collect()
}

#[test]
fn parses_ids_from_free_text() {
    let text = format!("{ALICE}, {BOB}\n{ALICE} not-an-id 123 {GHOST},,");
    assert_eq!(parse_principal_ids(&text), ids(&[ALICE, BOB, GHOST]));
    assert!(parse_principal_ids("  , \n").is_empty());
}

#[test]
fn action_parses() {
    assert_eq!("Remove".parse::<AssignAction>().unwrap(), AssignAction::Remove);
    assert_eq!(AssignAction::default(), AssignAction::Add);
    assert!("toggle".parse::<AssignAction>().is_err());
}

#[tokio::test]
async fn adds_group_and_isolates_unknown_members() {
    let mock = seeded();
    let assigner = RoleAssigner::new(as_remote(&mock), 50);

    let report = assigner
        .assign(AssignAction::Add, &GroupId::new(GROUP_A), &ids(&[ALICE, GHOST, BOB]))
        .await
        .unwrap();

    assert_eq!(report.group_name, "mods");
    assert_eq!(report.total, 3);
    assert_eq!(report.succeeded, ids(&[ALICE, BOB]));
    assert_eq!(report.failures.total(), 1);
    assert_eq!(report.failures.records()[0].item, GHOST);

    let group = GroupId::new(GROUP_A);
    assert!(mock.principal(ALICE).unwrap().group_ids.contains(&group));
    assert!(mock.principal(BOB).unwrap().group_ids.contains(&group));
}

#[tokio::test]
async fn remote_rejection_is_recorded_with_its_message() {
    let mock = seeded();
    mock.fail(
        "add_principal_to_group",
        BOB,
        RemoteError::permission_denied("Missing Permissions"),
    );

    let report = RoleAssigner::new(as_remote(&mock), 50)
        .assign(AssignAction::Add, &GroupId::new(GROUP_A), &ids(&[ALICE, BOB]))
        .await
        .unwrap();
    assert_eq!(report.succeeded, ids(&[ALICE]));
    assert_eq!(report.failures.records()[0].to_string(), format!("{BOB}: Missing Permissions"));
}

#[tokio::test]
async fn removes_group() {
    let mock = seeded();
    let assigner = RoleAssigner::new(as_remote(&mock), 50);
    let group = GroupId::new(GROUP_A);
    assigner
        .assign(AssignAction::Add, &group, &ids(&[ALICE]))
        .await
        .unwrap();

    let report = assigner
        .assign(AssignAction::Remove, &group, &ids(&[ALICE]))
        .await
        .unwrap();
    assert_eq!(report.succeeded.len(), 1);
    assert!(mock.principal(ALICE).unwrap().group_ids.is_empty());
}

#[tokio::test]
async fn rejects_bad_requests_before_touching_members() {
    let mock = seeded();
    let assigner = RoleAssigner::new(as_remote(&mock), 50);

    let err = assigner
        .assign(AssignAction::Add, &GroupId::new("mods"), &ids(&[ALICE]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidIdentifier(_)));

    let err = assigner
        .assign(AssignAction::Add, &GroupId::new(GROUP_A), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = assigner
        .assign(AssignAction::Add, &GroupId::new(GROUP_B), &ids(&[ALICE]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    assert!(mock.calls_to("fetch_principal").is_empty());
}
