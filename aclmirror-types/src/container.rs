//! Containers: nodes of the remote resource hierarchy.

use crate::{ContainerId, Error, RawOverride};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Variant tag of a container. Discriminants are the remote's numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContainerKind {
    Text = 0,
    Voice = 2,
    Category = 4,
    Announcement = 5,
    AnnouncementThread = 10,
    PublicThread = 11,
    PrivateThread = 12,
    StageVoice = 13,
    Directory = 14,
    Forum = 15,
    Media = 16,
}

impl ContainerKind {
    pub const ALL: &'static [ContainerKind] = &[
        ContainerKind::Text,
        ContainerKind::Voice,
        ContainerKind::Category,
        ContainerKind::Announcement,
        ContainerKind::AnnouncementThread,
        ContainerKind::PublicThread,
        ContainerKind::PrivateThread,
        ContainerKind::StageVoice,
        ContainerKind::Directory,
        ContainerKind::Forum,
        ContainerKind::Media,
    ];

    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: i64) -> Result<Self, Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| i64::from(k.code()) == code)
            .ok_or_else(|| Error::UnknownKind(code.to_string()))
    }

    /// The remote's canonical type name.
    #[must_use]
    pub const fn canonical_name(self) -> &'static str {
        match self {
            ContainerKind::Text => "GuildText",
            ContainerKind::Voice => "GuildVoice",
            ContainerKind::Category => "GuildCategory",
            ContainerKind::Announcement => "GuildAnnouncement",
            ContainerKind::AnnouncementThread => "AnnouncementThread",
            ContainerKind::PublicThread => "PublicThread",
            ContainerKind::PrivateThread => "PrivateThread",
            ContainerKind::StageVoice => "GuildStageVoice",
            ContainerKind::Directory => "GuildDirectory",
            ContainerKind::Forum => "GuildForum",
            ContainerKind::Media => "GuildMedia",
        }
    }

    #[must_use]
    pub const fn is_category(self) -> bool {
        matches!(self, ContainerKind::Category)
    }

    /// Threads are ephemeral sub-containers; the mirror never tracks them.
    #[must_use]
    pub const fn is_thread(self) -> bool {
        matches!(
            self,
            ContainerKind::AnnouncementThread
                | ContainerKind::PublicThread
                | ContainerKind::PrivateThread
        )
    }

    /// Resolves a user-supplied kind name.
    ///
    /// Accepts canonical names, common aliases and numeric codes. Case and
    /// punctuation are ignored ("Guild-Text", "guild_text" and "text" all
    /// resolve to `Text`).
    pub fn resolve(input: &str) -> Result<Self, Error> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::UnknownKind("container type is required".to_string()));
        }
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code);
        }

        let wanted = normalize_key(trimmed);
        if let Some(kind) = Self::ALL
            .iter()
            .copied()
            .find(|k| normalize_key(k.canonical_name()) == wanted)
        {
            return Ok(kind);
        }

        let kind = match wanted.as_str() {
            "text" => ContainerKind::Text,
            "voice" => ContainerKind::Voice,
            "category" => ContainerKind::Category,
            "announcement" | "news" | "guildnews" => ContainerKind::Announcement,
            "stage" | "stagevoice" => ContainerKind::StageVoice,
            "forum" => ContainerKind::Forum,
            "media" => ContainerKind::Media,
            "directory" => ContainerKind::Directory,
            _ => return Err(Error::UnknownKind(trimmed.to_string())),
        };
        Ok(kind)
    }
}

fn normalize_key(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

impl FromStr for ContainerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
    }
}

impl Serialize for ContainerKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for ContainerKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        ContainerKind::from_code(code).map_err(serde::de::Error::custom)
    }
}

/// A node in the resource hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    #[serde(rename = "type")]
    pub kind: ContainerKind,
    pub name: String,
    pub parent_id: Option<ContainerId>,
    pub position: i64,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub rate_limit_per_user: u32,
    #[serde(default)]
    pub bitrate: u32,
    #[serde(default)]
    pub user_limit: u32,
    #[serde(default)]
    pub overrides: Vec<RawOverride>,
    pub updated_at: DateTime<Utc>,
}

impl Container {
    /// A bare container of the given kind with every optional attribute unset.
    pub fn new(id: impl Into<ContainerId>, kind: ContainerKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            parent_id: None,
            position: 0,
            topic: None,
            nsfw: false,
            rate_limit_per_user: 0,
            bitrate: 0,
            user_limit: 0,
            overrides: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<ContainerId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    #[must_use]
    pub fn with_position(mut self, position: i64) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: Vec<RawOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Human-readable label used in failure reports.
    #[must_use]
    pub fn label(&self) -> String {
        format!("#{} ({})", self.name, self.id)
    }
}
