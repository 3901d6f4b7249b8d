//! Override canonicalization, comparison and merging.
//!
//! The canonical form of an override list is the list of typed
//! [`AccessOverride`]s sorted by (kind, target id bytes), with at most one
//! entry per (kind, target). Two lists compare equal exactly when their
//! canonical forms are positionally equal, so the order the remote happens to
//! report entries in never produces a spurious update.

use aclmirror_types::{AccessOverride, OverrideKind, Permissions, RawOverride};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from canonicalizing an override list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverrideError {
    /// An allow or deny half that does not resolve to a bitset.
    #[error("override for {target}: {source}")]
    Invalid {
        target: String,
        #[source]
        source: aclmirror_types::Error,
    },

    /// The same (kind, target) appears more than once.
    #[error("duplicate override for {kind} {target}")]
    DuplicateTarget { kind: OverrideKind, target: String },
}

/// A sorted, de-duplicated override list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CanonicalOverrides(Vec<AccessOverride>);

impl CanonicalOverrides {
    /// Sorts typed entries into canonical order.
    pub fn from_entries(mut entries: Vec<AccessOverride>) -> Result<Self, OverrideError> {
        entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        if let Some(pair) = entries.windows(2).find(|w| w[0].sort_key() == w[1].sort_key()) {
            return Err(OverrideError::DuplicateTarget {
                kind: pair[0].kind,
                target: pair[0].target_id.clone(),
            });
        }
        Ok(Self(entries))
    }

    pub fn as_slice(&self) -> &[AccessOverride] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AccessOverride> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The entry for `(kind, target)`, if any.
    pub fn get(&self, kind: OverrideKind, target: &str) -> Option<&AccessOverride> {
        self.0
            .binary_search_by(|o| o.sort_key().cmp(&(kind, target.as_bytes())))
            .ok()
            .map(|i| &self.0[i])
    }

    /// The list in the remote's representation.
    pub fn to_raw(&self) -> Vec<RawOverride> {
        self.0.iter().map(RawOverride::from).collect()
    }

    pub fn into_vec(self) -> Vec<AccessOverride> {
        self.0
    }
}

impl<'a> IntoIterator for &'a CanonicalOverrides {
    type Item = &'a AccessOverride;
    type IntoIter = std::slice::Iter<'a, AccessOverride>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Canonicalizes a raw override list. Absent allow/deny halves mean 0.
pub fn canonicalize(raw: &[RawOverride]) -> Result<CanonicalOverrides, OverrideError> {
    let entries = raw
        .iter()
        .map(|ow| {
            let resolve = |spec: &Option<aclmirror_types::PermissionSpec>| match spec {
                Some(spec) => spec.resolve().map_err(|source| OverrideError::Invalid {
                    target: ow.id.clone(),
                    source,
                }),
                None => Ok(Permissions::EMPTY),
            };
            Ok(AccessOverride::new(
                ow.id.trim(),
                ow.kind,
                resolve(&ow.allow)?,
                resolve(&ow.deny)?,
            ))
        })
        .collect::<Result<Vec<_>, OverrideError>>()?;
    CanonicalOverrides::from_entries(entries)
}

/// Positional equality of two canonical lists.
#[must_use]
pub fn overrides_equal(a: &CanonicalOverrides, b: &CanonicalOverrides) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

/// Upserts every entry of `desired` into `current`.
///
/// Entries present only in `current` are kept. Where both carry the same
/// (kind, target), the `desired` entry wins.
#[must_use]
pub fn merge_overrides(current: &CanonicalOverrides, desired: &CanonicalOverrides) -> CanonicalOverrides {
    let mut by_key: BTreeMap<(OverrideKind, &[u8]), &AccessOverride> =
        current.iter().map(|o| (o.sort_key(), o)).collect();
    for o in desired {
        by_key.insert(o.sort_key(), o);
    }
    CanonicalOverrides(by_key.into_values().cloned().collect())
}
