use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::MetadataError;
use crate::avatar_id::{AvatarId, InvalidAvatarId};

/// Descriptive record of a stored avatar, persisted at `avatar:{id}`.
///
/// Serialized field names are the stored wire format and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarMetadata {
    #[serde(rename = "guid")]
    pub id: AvatarId,
    #[serde(rename = "username")]
    pub owner: String,
    #[serde(rename = "filename")]
    pub original_name: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    pub mime_type: String,
    #[serde(rename = "uploaded_at")]
    pub created_at: DateTime<Utc>,
}

pub fn metadata_key(id: &AvatarId) -> String {
    format!("avatar:{id}")
}

pub fn owner_key(owner: &str) -> String {
    format!("username:{owner}")
}

/// Parse the value stored under an owner key.
pub(crate) fn decode_mapping(key: &str, raw: &str) -> Result<AvatarId, MetadataError> {
    raw.parse().map_err(|e: InvalidAvatarId| MetadataError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
