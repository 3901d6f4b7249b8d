//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use aclmirror_store::MirrorStore;
use aclmirror_sync::remote::mock::MockPlatform;
use aclmirror_sync::{EngineConfig, MirrorEngine, RemotePlatform};
use aclmirror_types::{Container, ContainerKind, OverrideKind, PermissionSpec, RawOverride};
use std::sync::Arc;
use std::time::Duration;

/// Ids chosen so the canonical order is GROUP_B, everyone, GROUP_A.
pub const GROUP_B: &str = "100000000000000001";
pub const WORKSPACE: &str = "100000000000000002";
pub const GROUP_A: &str = "100000000000000003";

pub const CATEGORY: &str = "200000000000000001";
pub const CHANNEL_X: &str = "200000000000000002";
pub const CHANNEL_Y: &str = "200000000000000003";
pub const CHANNEL_Z: &str = "200000000000000004";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn make_mock() -> Arc<MockPlatform> {
    init_tracing();
    Arc::new(MockPlatform::new(WORKSPACE))
}

pub fn as_remote(mock: &Arc<MockPlatform>) -> Arc<dyn RemotePlatform> {
    Arc::clone(mock) as Arc<dyn RemotePlatform>
}

pub fn make_config() -> EngineConfig {
    let mut config = EngineConfig::for_workspace(WORKSPACE);
    config.pace_delay = Duration::ZERO;
    config
}

pub fn make_engine(mock: &Arc<MockPlatform>) -> MirrorEngine {
    MirrorEngine::new(make_config(), as_remote(mock), MirrorStore::open_in_memory().unwrap()).unwrap()
}

fn names(list: &[&str]) -> PermissionSpec {
    PermissionSpec::Names(list.iter().map(|s| s.to_string()).collect())
}

/// A group-targeted override from permission names.
pub fn ow(target: &str, allow: &[&str], deny: &[&str]) -> RawOverride {
    RawOverride {
        id: target.to_string(),
        kind: OverrideKind::Group,
        allow: Some(names(allow)),
        deny: Some(names(deny)),
    }
}

pub fn category(id: &str, name: &str, overrides: Vec<RawOverride>) -> Container {
    Container::new(id, ContainerKind::Category, name).with_overrides(overrides)
}

pub fn text(id: &str, name: &str, parent: &str, position: i64, overrides: Vec<RawOverride>) -> Container {
    Container::new(id, ContainerKind::Text, name)
        .with_parent(parent)
        .with_position(position)
        .with_overrides(overrides)
}

/// Category C: everyone denied Send, GROUP_A allowed View and Send.
pub fn scenario_category() -> Container {
    category(
        CATEGORY,
        "C",
        vec![
            ow(WORKSPACE, &[], &["SendMessages"]),
            ow(GROUP_A, &["ViewChannel", "SendMessages"], &[]),
        ],
    )
}

/// Channel X under C: GROUP_B allowed View.
pub fn scenario_channel() -> Container {
    text(CHANNEL_X, "x", CATEGORY, 0, vec![ow(GROUP_B, &["ViewChannel"], &[])])
}
