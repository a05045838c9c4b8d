use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix under which avatar payloads live in blob storage.
pub const BLOB_PREFIX: &str = "avatars";

/// A generated avatar identifier (random UUIDv4, hyphenated lowercase).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AvatarId(Uuid);

/// Error returned when parsing a malformed avatar identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidAvatarId(pub String);

impl fmt::Display for InvalidAvatarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid avatar id: {}", self.0)
    }
}

impl std::error::Error for InvalidAvatarId {}

impl AvatarId {
    /// Generate a fresh, collision-resistant identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Blob storage key for this avatar: `avatars/{id}`.
    pub fn blob_key(&self) -> String {
        format!("{BLOB_PREFIX}/{}", self.0)
    }

    /// Inverse of [`AvatarId::blob_key`].
    pub fn from_blob_key(key: &str) -> Option<Self> {
        let rest = key.strip_prefix(BLOB_PREFIX)?.strip_prefix('/')?;
        rest.parse().ok()
    }
}

impl FromStr for AvatarId {
    type Err = InvalidAvatarId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| InvalidAvatarId(format!("{s:?}: {e}")))
    }
}

impl fmt::Debug for AvatarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AvatarId({})", self.0)
    }
}

impl fmt::Display for AvatarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl Serialize for AvatarId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AvatarId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
