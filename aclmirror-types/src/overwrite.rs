//! Per-container access overrides.
//!
//! `RawOverride` is what the remote platform (or an import payload) hands us:
//! the allow/deny halves may be numeric literals, decimal strings, a comma
//! separated list of names or a list of names. `AccessOverride` is the typed,
//! exact form that canonicalization produces.

use crate::{Error, Permissions};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// What an override targets.
///
/// The derived ordering (`Group` before `Principal`) follows the remote's
/// numeric codes and is the first half of the canonical sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OverrideKind {
    /// A principal group, including the everyone group. Remote code 0.
    Group,
    /// A single principal. Remote code 1.
    Principal,
}

impl OverrideKind {
    /// Remote numeric code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            OverrideKind::Group => 0,
            OverrideKind::Principal => 1,
        }
    }

    pub fn from_code(code: u64) -> Result<Self, Error> {
        match code {
            0 => Ok(OverrideKind::Group),
            1 => Ok(OverrideKind::Principal),
            other => Err(Error::UnknownOverrideKind(other.to_string())),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            OverrideKind::Group => "group",
            OverrideKind::Principal => "principal",
        }
    }
}

impl fmt::Display for OverrideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverrideKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "group" | "role" => Ok(OverrideKind::Group),
            "1" | "principal" | "member" | "user" => Ok(OverrideKind::Principal),
            other => Err(Error::UnknownOverrideKind(other.to_string())),
        }
    }
}

impl Serialize for OverrideKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for OverrideKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KindVisitor;

        impl Visitor<'_> for KindVisitor {
            type Value = OverrideKind;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an override kind code (0, 1) or name")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                OverrideKind::from_code(v).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                let code = u64::try_from(v).map_err(|_| E::custom(format!("bad kind {v}")))?;
                OverrideKind::from_code(code).map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(KindVisitor)
    }
}

/// An allow or deny half, in any of the encodings the remote or an import
/// payload may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionSpec {
    /// A numeric literal.
    Bits(u64),
    /// A decimal string, a comma separated name list, or a single name.
    Text(String),
    /// A list of permission names.
    Names(Vec<String>),
}

impl PermissionSpec {
    /// Resolves the spec into an exact bitset.
    ///
    /// Digits-only text is an integer; anything else goes through the
    /// permission name table, where an unknown name is an error.
    pub fn resolve(&self) -> Result<Permissions, Error> {
        match self {
            PermissionSpec::Bits(bits) => Ok(Permissions::from_bits(u128::from(*bits))),
            PermissionSpec::Names(names) => Permissions::from_names(names),
            PermissionSpec::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    Ok(Permissions::EMPTY)
                } else if text.bytes().all(|b| b.is_ascii_digit()) {
                    Permissions::parse_decimal(text)
                } else {
                    Permissions::from_names(text.split(',').map(str::trim).filter(|s| !s.is_empty()))
                }
            }
        }
    }
}

impl From<Permissions> for PermissionSpec {
    fn from(p: Permissions) -> Self {
        PermissionSpec::Text(p.to_string())
    }
}

/// One override entry as reported by the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOverride {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OverrideKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<PermissionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny: Option<PermissionSpec>,
}

impl RawOverride {
    /// Convenience constructor for a group-targeted override.
    pub fn group(id: impl Into<String>, allow: PermissionSpec, deny: PermissionSpec) -> Self {
        Self {
            id: id.into(),
            kind: OverrideKind::Group,
            allow: Some(allow),
            deny: Some(deny),
        }
    }
}

/// One override entry in exact, typed form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessOverride {
    pub target_id: String,
    pub kind: OverrideKind,
    pub allow: Permissions,
    pub deny: Permissions,
}

impl AccessOverride {
    pub fn new(
        target_id: impl Into<String>,
        kind: OverrideKind,
        allow: Permissions,
        deny: Permissions,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            kind,
            allow,
            deny,
        }
    }

    /// Canonical sort key: kind first, then target identifier bytes.
    #[must_use]
    pub fn sort_key(&self) -> (OverrideKind, &[u8]) {
        (self.kind, self.target_id.as_bytes())
    }
}

impl From<&AccessOverride> for RawOverride {
    fn from(ow: &AccessOverride) -> Self {
        Self {
            id: ow.target_id.clone(),
            kind: ow.kind,
            allow: Some(ow.allow.into()),
            deny: Some(ow.deny.into()),
        }
    }
}
