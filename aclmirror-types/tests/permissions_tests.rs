use aclmirror_types::{Error, Permission, PermissionSpec, Permissions};
use proptest::prelude::*;

// ── Permission table ────────────────────────────────────────────

#[test]
fn names_map_to_bits() {
    assert_eq!(Permission::ViewChannel.bit(), 10);
    assert_eq!(Permission::SendMessages.bit(), 11);
    assert_eq!(Permission::Administrator.mask(), 8);
    assert_eq!("SendPolls".parse::<Permission>().unwrap().bit(), 49);
}

#[test]
fn legacy_alias_is_accepted() {
    assert_eq!(
        "ManageEmojisAndStickers".parse::<Permission>().unwrap(),
        Permission::ManageGuildExpressions
    );
}

#[test]
fn unknown_name_is_an_error() {
    let err = "SendMessage".parse::<Permission>().unwrap_err();
    assert_eq!(err, Error::UnknownPermission("SendMessage".to_string()));
}

#[test]
fn table_names_roundtrip() {
    for perm in Permission::ALL {
        assert_eq!(perm.name().parse::<Permission>().unwrap(), *perm);
    }
}

// ── Permissions bitset ──────────────────────────────────────────

#[test]
fn from_names_sets_every_bit() {
    let p = Permissions::from_names(["ViewChannel", "SendMessages"]).unwrap();
    assert_eq!(p.bits(), (1 << 10) | (1 << 11));
    assert!(p.contains(Permission::ViewChannel));
    assert!(!p.contains(Permission::Administrator));
    assert_eq!(p.iter().collect::<Vec<_>>(), vec![Permission::ViewChannel, Permission::SendMessages]);
}

#[test]
fn bitset_serializes_as_decimal_string() {
    let p = Permissions::from_bits(1u128 << 100);
    let json = serde_json::to_string(&p).unwrap();
    assert_eq!(json, format!("\"{}\"", 1u128 << 100));
    let back: Permissions = serde_json::from_str(&json).unwrap();
    assert_eq!(back, p);
}

#[test]
fn bitset_deserializes_from_integer() {
    let p: Permissions = serde_json::from_str("3072").unwrap();
    assert_eq!(p.bits(), 3072);
    assert!(serde_json::from_str::<Permissions>("-1").is_err());
}

#[test]
fn parse_decimal_rejects_garbage() {
    assert!(Permissions::parse_decimal("12a").is_err());
    assert!(Permissions::parse_decimal("").is_err());
    // One past u128::MAX.
    assert!(Permissions::parse_decimal("340282366920938463463374607431768211456").is_err());
}

// ── PermissionSpec ──────────────────────────────────────────────

#[test]
fn spec_variants_resolve() {
    let send = Permission::SendMessages.mask();
    assert_eq!(PermissionSpec::Bits(2048).resolve().unwrap().bits(), send);
    assert_eq!(PermissionSpec::Text("2048".into()).resolve().unwrap().bits(), send);
    assert_eq!(PermissionSpec::Text("SendMessages".into()).resolve().unwrap().bits(), send);
    assert_eq!(
        PermissionSpec::Text(" ViewChannel , SendMessages ".into()).resolve().unwrap().bits(),
        send | Permission::ViewChannel.mask()
    );
    assert_eq!(
        PermissionSpec::Names(vec!["SendMessages".into()]).resolve().unwrap().bits(),
        send
    );
    assert!(PermissionSpec::Text("  ".into()).resolve().unwrap().is_empty());
}

#[test]
fn spec_with_unknown_name_fails() {
    let err = PermissionSpec::Names(vec!["Fly".into()]).resolve().unwrap_err();
    assert!(matches!(err, Error::UnknownPermission(name) if name == "Fly"));
}

#[test]
fn spec_deserializes_untagged() {
    let specs: Vec<PermissionSpec> =
        serde_json::from_str(r#"[1024, "1024", "ViewChannel", ["ViewChannel"]]"#).unwrap();
    for spec in specs {
        assert_eq!(spec.resolve().unwrap(), Permissions::from(Permission::ViewChannel));
    }
}

proptest! {
    #[test]
    fn decimal_string_is_exact(bits in any::<u128>()) {
        let p = Permissions::from_bits(bits);
        let parsed: Permissions = p.to_string().parse().unwrap();
        prop_assert_eq!(parsed.bits(), bits);
    }
}
