use aclmirror_types::{Container, ContainerKind, OverrideKind, PushAction, PushEntity, PushEvent, WorkspaceId};

#[test]
fn kind_resolves_canonical_names_and_aliases() {
    assert_eq!(ContainerKind::resolve("GuildText").unwrap(), ContainerKind::Text);
    assert_eq!(ContainerKind::resolve("guild_text").unwrap(), ContainerKind::Text);
    assert_eq!(ContainerKind::resolve("TEXT").unwrap(), ContainerKind::Text);
    assert_eq!(ContainerKind::resolve("Category").unwrap(), ContainerKind::Category);
    assert_eq!(ContainerKind::resolve("stage-voice").unwrap(), ContainerKind::StageVoice);
    assert_eq!(ContainerKind::resolve("4").unwrap(), ContainerKind::Category);
    assert_eq!(ContainerKind::resolve("PublicThread").unwrap(), ContainerKind::PublicThread);
}

#[test]
fn kind_rejects_unknown_and_empty() {
    assert!(ContainerKind::resolve("spaceship").is_err());
    assert!(ContainerKind::resolve("   ").is_err());
    assert!(ContainerKind::resolve("3").is_err());
}

#[test]
fn thread_kinds() {
    assert!(ContainerKind::PublicThread.is_thread());
    assert!(ContainerKind::PrivateThread.is_thread());
    assert!(ContainerKind::AnnouncementThread.is_thread());
    assert!(!ContainerKind::Text.is_thread());
    assert!(ContainerKind::Category.is_category());
}

#[test]
fn kind_serializes_as_code() {
    assert_eq!(serde_json::to_string(&ContainerKind::Forum).unwrap(), "15");
    let k: ContainerKind = serde_json::from_str("2").unwrap();
    assert_eq!(k, ContainerKind::Voice);
}

#[test]
fn override_kind_accepts_codes_and_names() {
    assert_eq!(serde_json::from_str::<OverrideKind>("0").unwrap(), OverrideKind::Group);
    assert_eq!(serde_json::from_str::<OverrideKind>("\"member\"").unwrap(), OverrideKind::Principal);
    assert!(serde_json::from_str::<OverrideKind>("7").is_err());
    assert!(OverrideKind::Group < OverrideKind::Principal);
}

#[test]
fn push_event_json_shape() {
    let ws = WorkspaceId::new("900000000000000000");
    let ch = Container::new("700000000000000001", ContainerKind::Text, "general");
    let event = PushEvent::container(ws, PushAction::Delete, ch.clone());
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["entity_type"], "container");
    assert_eq!(json["action"], "delete");
    let back: PushEvent = serde_json::from_value(json).unwrap();
    assert_eq!(back.entity, PushEntity::Container(ch));
}
