use aclmirror_sync::{EngineConfig, EngineError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn defaults() {
    let config = EngineConfig::for_workspace("100000000000000002");
    assert_eq!(config.sync_interval, Duration::from_secs(60));
    assert_eq!(config.pace_delay, Duration::from_millis(250));
    assert_eq!(config.sync_failure_limit, 15);
    assert_eq!(config.delete_failure_limit, 25);
    assert_eq!(config.report_failure_limit, 50);
    assert_eq!(config.group_concurrency, 3);
    assert_eq!(config.container_concurrency, 2);
    assert_eq!(config.max_import_groups, 250);
    assert_eq!(config.max_import_containers, 500);
}

#[test]
fn environment_overrides_defaults() {
    let config = EngineConfig::from_lookup(lookup(&[
        ("ACLMIRROR_WORKSPACE", " 100000000000000002 "),
        ("ACLMIRROR_SYNC_INTERVAL_SECS", "300"),
        ("ACLMIRROR_PACE_MS", "0"),
        ("ACLMIRROR_CACHE_PATH", "/var/lib/mirror/cache.db"),
        ("ACLMIRROR_EXPORT_DIR", "/tmp/exports"),
    ]))
    .unwrap();

    assert_eq!(config.workspace_id.as_str(), "100000000000000002");
    assert_eq!(config.sync_interval, Duration::from_secs(300));
    assert_eq!(config.pace_delay, Duration::ZERO);
    assert_eq!(config.cache_path, PathBuf::from("/var/lib/mirror/cache.db"));
    assert_eq!(config.export_dir, PathBuf::from("/tmp/exports"));
}

#[test]
fn workspace_is_required_and_checked() {
    let err = EngineConfig::from_lookup(lookup(&[])).unwrap_err();
    assert!(matches!(err, EngineError::Config(ref m) if m.contains("ACLMIRROR_WORKSPACE")));

    let err = EngineConfig::from_lookup(lookup(&[("ACLMIRROR_WORKSPACE", "my-server")])).unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}

#[test]
fn bad_numbers_are_rejected() {
    let err = EngineConfig::from_lookup(lookup(&[
        ("ACLMIRROR_WORKSPACE", "100000000000000002"),
        ("ACLMIRROR_SYNC_INTERVAL_SECS", "0"),
    ]))
    .unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));

    let err = EngineConfig::from_lookup(lookup(&[
        ("ACLMIRROR_WORKSPACE", "100000000000000002"),
        ("ACLMIRROR_PACE_MS", "fast"),
    ]))
    .unwrap_err();
    assert!(matches!(err, EngineError::Config(ref m) if m.contains("ACLMIRROR_PACE_MS")));
}

#[test]
fn deserializes_with_defaults_for_missing_keys() {
    let config: EngineConfig = serde_json::from_str(
        r#"{ "workspace_id": "100000000000000002", "pace_delay_ms": 10, "group_concurrency": 8 }"#,
    )
    .unwrap();
    assert_eq!(config.pace_delay, Duration::from_millis(10));
    assert_eq!(config.group_concurrency, 8);
    assert_eq!(config.sync_interval, Duration::from_secs(60));
}
