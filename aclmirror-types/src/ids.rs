//! Identifier types used throughout the mirror.
//!
//! The remote platform hands out opaque string identifiers that are stable
//! across time. They are usually "snowflakes" (15 to 25 decimal digits), but
//! the types here never reject other shapes: only user input is validated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Returns true if `s` has the remote identifier shape (15–25 ASCII digits).
pub fn is_snowflake(s: &str) -> bool {
    (15..=25).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the identifier has the snowflake shape.
            #[must_use]
            pub fn is_snowflake(&self) -> bool {
                is_snowflake(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_string()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Identifier of a container (category, text channel, voice channel, ...).
    ContainerId
);

string_id!(
    /// Identifier of a principal group.
    GroupId
);

string_id!(
    /// Identifier of a principal (a member of the workspace).
    PrincipalId
);

string_id!(
    /// Identifier of the maintained workspace.
    ///
    /// The everyone group shares this identifier.
    WorkspaceId
);

impl WorkspaceId {
    /// The identifier of the distinguished "everyone" group of this workspace.
    #[must_use]
    pub fn everyone_group(&self) -> GroupId {
        GroupId(self.0.clone())
    }
}
