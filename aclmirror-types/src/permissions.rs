//! Permission names and the permission bitset.
//!
//! The remote platform encodes permissions as an unbounded-width integer that
//! it serialises as a decimal string. We keep it as a `u128`, which leaves
//! plenty of headroom above the highest bit currently defined.

use crate::Error;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};
use std::str::FromStr;

/// Version of the name↔bit table below. Bump when bits are added.
pub const PERMISSION_TABLE_VERSION: u32 = 1;

macro_rules! permission_table {
    ($($variant:ident = $bit:expr),+ $(,)?) => {
        /// A single named permission flag.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Permission {
            $($variant),+
        }

        impl Permission {
            /// Every known permission, in bit order.
            pub const ALL: &'static [Permission] = &[$(Permission::$variant),+];

            /// Bit position of this permission.
            #[must_use]
            pub const fn bit(self) -> u32 {
                match self {
                    $(Permission::$variant => $bit),+
                }
            }

            /// The canonical flag name used by the remote platform.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Permission::$variant => stringify!($variant)),+
                }
            }

            fn lookup(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($variant) => Some(Permission::$variant),)+
                    "ManageEmojisAndStickers" => Some(Permission::ManageGuildExpressions),
                    _ => None,
                }
            }
        }
    };
}

permission_table! {
    CreateInstantInvite = 0,
    KickMembers = 1,
    BanMembers = 2,
    Administrator = 3,
    ManageChannels = 4,
    ManageGuild = 5,
    AddReactions = 6,
    ViewAuditLog = 7,
    PrioritySpeaker = 8,
    Stream = 9,
    ViewChannel = 10,
    SendMessages = 11,
    SendTTSMessages = 12,
    ManageMessages = 13,
    EmbedLinks = 14,
    AttachFiles = 15,
    ReadMessageHistory = 16,
    MentionEveryone = 17,
    UseExternalEmojis = 18,
    ViewGuildInsights = 19,
    Connect = 20,
    Speak = 21,
    MuteMembers = 22,
    DeafenMembers = 23,
    MoveMembers = 24,
    UseVAD = 25,
    ChangeNickname = 26,
    ManageNicknames = 27,
    ManageRoles = 28,
    ManageWebhooks = 29,
    ManageGuildExpressions = 30,
    UseApplicationCommands = 31,
    RequestToSpeak = 32,
    ManageEvents = 33,
    ManageThreads = 34,
    CreatePublicThreads = 35,
    CreatePrivateThreads = 36,
    UseExternalStickers = 37,
    SendMessagesInThreads = 38,
    UseEmbeddedActivities = 39,
    ModerateMembers = 40,
    ViewCreatorMonetizationAnalytics = 41,
    UseSoundboard = 42,
    CreateGuildExpressions = 43,
    CreateEvents = 44,
    UseExternalSounds = 45,
    SendVoiceMessages = 46,
    SendPolls = 49,
    UseExternalApps = 50,
}

impl Permission {
    /// The single-bit mask of this permission.
    #[must_use]
    pub const fn mask(self) -> u128 {
        1u128 << self.bit()
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s.trim()).ok_or_else(|| Error::UnknownPermission(s.trim().to_string()))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A permission bitset.
///
/// Serialises as a decimal string so that no consumer ever routes it through
/// a floating-point number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Permissions(u128);

impl Permissions {
    /// The empty set.
    pub const EMPTY: Permissions = Permissions(0);

    /// Creates a bitset from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u128) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u128 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if every bit of `perm` is set.
    #[must_use]
    pub const fn contains(self, perm: Permission) -> bool {
        self.0 & perm.mask() != 0
    }

    /// Builds a bitset from permission names. Any unknown name is an error.
    pub fn from_names<I, S>(names: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut bits = 0u128;
        for name in names {
            let perm: Permission = name.as_ref().parse()?;
            bits |= perm.mask();
        }
        Ok(Self(bits))
    }

    /// Parses a decimal bitset string.
    pub fn parse_decimal(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidBitset(s.to_string()));
        }
        s.parse::<u128>()
            .map(Self)
            .map_err(|e| Error::InvalidBitset(format!("{s}: {e}")))
    }

    /// The known permissions contained in this set, in bit order.
    pub fn iter(self) -> impl Iterator<Item = Permission> {
        Permission::ALL
            .iter()
            .copied()
            .filter(move |p| self.contains(*p))
    }
}

impl From<Permission> for Permissions {
    fn from(p: Permission) -> Self {
        Self(p.mask())
    }
}

impl FromIterator<Permission> for Permissions {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().fold(0, |acc, p| acc | p.mask()))
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Permissions {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for Permissions {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Permissions {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_decimal(s)
    }
}

impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BitsVisitor;

        impl Visitor<'_> for BitsVisitor {
            type Value = Permissions;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal permission string or a non-negative integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Permissions(u128::from(v)))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<Self::Value, E> {
                Ok(Permissions(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u128::try_from(v)
                    .map(Permissions)
                    .map_err(|_| E::custom(format!("negative permission bitset: {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Permissions::parse_decimal(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(BitsVisitor)
    }
}
