mod common;

use aclmirror_sync::import::{ColorSpec, ImportReport};
use aclmirror_sync::remote::RemoteError;
use aclmirror_sync::{canonicalize, EngineError, ImportPayload, Importer};
use aclmirror_types::{ContainerId, ContainerKind, OverrideKind, Permission, Permissions, PrincipalGroup};
use common::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn payload(value: serde_json::Value) -> ImportPayload {
    serde_json::from_value(value).unwrap()
}

fn created_id(report: &ImportReport, name: &str) -> String {
    report
        .groups_created
        .iter()
        .chain(&report.containers_created)
        .find(|item| item.name == name)
        .map(|item| item.id.clone())
        .unwrap_or_else(|| panic!("{name} was not created"))
}

#[tokio::test]
async fn later_items_reference_earlier_ones_by_name() {
    let mock = make_mock();
    let importer = Importer::new(as_remote(&mock), make_config());

    let report = importer
        .apply_import(&payload(json!({
            "roles": [{ "name": "Admin", "permissions": ["Administrator"], "color": "#ff8800" }],
            "channels": [
                {
                    "type": "text",
                    "name": "rules",
                    "parent": "Info",
                    "permissionOverwrites": [
                        { "role": "@everyone", "deny": ["SendMessages"] },
                        { "role": "Admin", "allow": "SendMessages" }
                    ]
                },
                { "type": "category", "name": "Info" }
            ]
        })))
        .await
        .unwrap();

    assert_eq!(report.created(), 3);
    assert_eq!(report.failed(), 0);

    let admin_id = created_id(&report, "Admin");
    let admin = mock.group(&admin_id).unwrap();
    assert_eq!(admin.permissions, Permissions::from(Permission::Administrator));
    assert_eq!(admin.color, 0xff8800);

    let info_id = created_id(&report, "Info");
    let rules = mock.container(&created_id(&report, "rules")).unwrap();
    assert_eq!(rules.kind, ContainerKind::Text);
    assert_eq!(rules.parent_id, Some(ContainerId::new(&info_id)));

    let overrides = canonicalize(&rules.overrides).unwrap();
    assert_eq!(overrides.len(), 2);
    let everyone = overrides.get(OverrideKind::Group, WORKSPACE).unwrap();
    assert_eq!(everyone.deny, Permissions::from(Permission::SendMessages));
    let admin_ow = overrides.get(OverrideKind::Group, &admin_id).unwrap();
    assert_eq!(admin_ow.allow, Permissions::from(Permission::SendMessages));

    let kinds: Vec<_> = report.containers_created.iter().map(|c| c.kind.as_str()).collect();
    assert_eq!(kinds, vec!["GuildCategory", "GuildText"]);
}

#[tokio::test]
async fn names_fall_back_to_existing_workspace_entities() {
    let mock = make_mock();
    mock.insert_group(PrincipalGroup::new(GROUP_A, "Staff", 3));
    mock.insert_container(scenario_category());
    let importer = Importer::new(as_remote(&mock), make_config());

    let report = importer
        .apply_import(&payload(json!({
            "containers": [{
                "type": 0,
                "name": "staff-chat",
                "parent": "C",
                "overwrites": [{ "target": "Staff", "allow": "3072" }]
            }]
        })))
        .await
        .unwrap();

    let chat = mock.container(&created_id(&report, "staff-chat")).unwrap();
    assert_eq!(chat.parent_id, Some(ContainerId::new(CATEGORY)));
    let overrides = canonicalize(&chat.overrides).unwrap();
    assert_eq!(overrides.get(OverrideKind::Group, GROUP_A).unwrap().allow.bits(), 3072);
}

#[tokio::test]
async fn over_limit_payload_is_rejected_before_any_remote_call() {
    let mock = make_mock();
    let mut config = make_config();
    config.max_import_groups = 1;
    let importer = Importer::new(as_remote(&mock), config);

    let err = importer
        .apply_import(&payload(json!({ "groups": [{ "name": "a" }, { "name": "b" }] })))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::ImportLimit { what: "groups", count: 2, limit: 1 }
    ));
    assert!(mock.calls().is_empty());

    let mut config = make_config();
    config.max_import_containers = 0;
    let err = Importer::new(as_remote(&mock), config)
        .apply_import(&payload(json!({ "channels": [{ "type": "text", "name": "x" }] })))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ImportLimit { what: "containers", .. }));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn failures_are_isolated_per_item() {
    let mock = make_mock();
    mock.fail("create_group", "Mods", RemoteError::permission_denied("Missing Permissions"));
    let importer = Importer::new(as_remote(&mock), make_config());

    let report = importer
        .apply_import(&payload(json!({
            "groups": [{ "name": "Mods" }, { "name": "Helpers" }, { "name": "  " }],
            "channels": [
                { "type": "hologram", "name": "weird" },
                { "type": "text", "name": "lost", "parent": "Nowhere" },
                { "type": "text", "name": "bad-perms", "overwrites": [{ "id": "@everyone", "allow": ["Fly"] }] },
                { "type": "text", "name": "fine" }
            ]
        })))
        .await
        .unwrap();

    assert_eq!(report.groups_created.len(), 1);
    assert_eq!(report.groups_created[0].name, "Helpers");
    let group_failures: Vec<_> = report
        .groups_failed
        .records()
        .iter()
        .map(|f| (f.name.as_str(), f.message.as_str()))
        .collect();
    assert_eq!(group_failures[0], ("Mods", "Missing Permissions"));
    assert_eq!(group_failures[1].0, "  ");

    assert_eq!(report.containers_created.len(), 1);
    assert_eq!(report.containers_created[0].name, "fine");
    assert_eq!(report.containers_failed.total(), 3);

    let failed = report.containers_failed.records();
    let weird = failed.iter().find(|f| f.name == "weird").unwrap();
    assert_eq!(weird.kind, "hologram");
    let lost = failed.iter().find(|f| f.name == "lost").unwrap();
    assert!(lost.message.contains("Nowhere"), "{}", lost.message);
    let bad = failed.iter().find(|f| f.name == "bad-perms").unwrap();
    assert!(bad.message.contains("Fly"), "{}", bad.message);
}

#[tokio::test]
async fn malformed_items_fail_alone() {
    let mock = make_mock();
    let importer = Importer::new(as_remote(&mock), make_config());

    let report = importer
        .apply_import(&payload(json!({
            "roles": [
                { "name": "Odd", "permissions": { "bits": 8 } },
                { "name": "Plain", "color": -1 }
            ],
            "channels": [
                { "name": "no-type" },
                { "type": "category", "name": "Info" },
                { "type": "text", "name": "slow", "parent": "Info", "rateLimitPerUser": "5" },
                { "type": "voice", "name": "loud", "bitrate": "96000.9", "userLimit": 4.5 },
                { "type": "text", "name": "chatty", "rateLimitPerUser": "fast" },
                { "type": "text", "name": "strange", "overwrites": [{ "id": "@everyone", "allow": true }] },
                { "type": "text", "name": "aimless", "overwrites": [{ "allow": ["ViewChannel"] }] }
            ]
        })))
        .await
        .unwrap();

    let group_failures = report.groups_failed.records();
    assert_eq!(group_failures.len(), 1);
    assert_eq!(group_failures[0].name, "Odd");
    assert!(group_failures[0].message.contains("permissions"), "{}", group_failures[0].message);
    assert_eq!(mock.group(&created_id(&report, "Plain")).unwrap().color, 0);

    let info_id = created_id(&report, "Info");
    let slow = mock.container(&created_id(&report, "slow")).unwrap();
    assert_eq!(slow.parent_id, Some(ContainerId::new(&info_id)));
    assert_eq!(slow.rate_limit_per_user, 5);
    let loud = mock.container(&created_id(&report, "loud")).unwrap();
    assert_eq!(loud.bitrate, 96000);
    assert_eq!(loud.user_limit, 4);

    assert_eq!(report.containers_created.len(), 3);
    let failed = report.containers_failed.records();
    let message = |name: &str| {
        failed
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.message.clone())
            .unwrap_or_else(|| panic!("{name} did not fail"))
    };
    assert!(message("no-type").contains("type is required"));
    assert!(message("chatty").contains("rateLimitPerUser"));
    assert!(message("strange").contains("allow"));
    assert!(message("aimless").contains("target required"));
    assert_eq!(failed.iter().find(|f| f.name == "no-type").unwrap().kind, "");
    assert_eq!(report.containers_failed.total(), 4);
}

#[tokio::test]
async fn numeric_attributes_are_clamped() {
    let mock = make_mock();
    let importer = Importer::new(as_remote(&mock), make_config());

    let report = importer
        .apply_import(&payload(json!({
            "channels": [
                { "type": "voice", "name": "lounge", "bitrate": 100, "user_limit": -3 },
                { "type": "GuildText", "name": "slow", "rate_limit": -5, "nsfw": true, "topic": "t" }
            ]
        })))
        .await
        .unwrap();

    let lounge = mock.container(&created_id(&report, "lounge")).unwrap();
    assert_eq!(lounge.bitrate, 8000);
    assert_eq!(lounge.user_limit, 0);

    let slow = mock.container(&created_id(&report, "slow")).unwrap();
    assert_eq!(slow.rate_limit_per_user, 0);
    assert!(slow.nsfw);
    assert_eq!(slow.topic.as_deref(), Some("t"));
}

#[test]
fn payload_accepts_alternate_field_names() {
    let a = payload(json!({
        "roles": [{ "name": "r" }],
        "channels": [{
            "type": "text",
            "name": "c",
            "rateLimitPerUser": 5,
            "userLimit": 2,
            "overwrites": [{ "targetId": "@everyone" }]
        }]
    }));
    let b = payload(json!({
        "groups": [{ "name": "r" }],
        "containers": [{
            "type": "text",
            "name": "c",
            "rate_limit": 5,
            "user_limit": 2,
            "permissionOverwrites": [{ "role": "@everyone" }]
        }]
    }));
    assert_eq!(a, b);
}

#[test]
fn color_spec_resolution() {
    assert_eq!(ColorSpec::Value(42).resolve(), Some(42));
    assert_eq!(ColorSpec::Hex("#00ff00".into()).resolve(), Some(0x00ff00));
    assert_eq!(ColorSpec::Hex("abcdef".into()).resolve(), Some(0xabcdef));
    assert_eq!(ColorSpec::Hex("#fff".into()).resolve(), None);
    assert_eq!(ColorSpec::Hex("teal".into()).resolve(), None);
}
