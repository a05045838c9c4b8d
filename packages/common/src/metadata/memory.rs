use async_trait::async_trait;
use dashmap::DashMap;

use super::error::MetadataError;
use super::model::{AvatarMetadata, decode_mapping, metadata_key, owner_key};
use super::traits::MetadataStore;
use crate::avatar_id::AvatarId;

/// In-process metadata store.
///
/// Values are kept in the same serialized form and key layout as the Redis
/// store, so records written here look exactly like persisted ones.
#[derive(Default)]
pub struct MemoryMetadataStore {
    entries: DashMap<String, String>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored value for `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn put_metadata(&self, metadata: &AvatarMetadata) -> Result<(), MetadataError> {
        let json = serde_json::to_string(metadata)?;
        self.entries.insert(metadata_key(&metadata.id), json);
        Ok(())
    }

    async fn get_metadata(&self, id: &AvatarId) -> Result<Option<AvatarMetadata>, MetadataError> {
        match self.entries.get(&metadata_key(id)) {
            Some(raw) => Ok(Some(serde_json::from_str(raw.value())?)),
            None => Ok(None),
        }
    }

    async fn delete_metadata(&self, id: &AvatarId) -> Result<bool, MetadataError> {
        Ok(self.entries.remove(&metadata_key(id)).is_some())
    }

    async fn set_owner(&self, owner: &str, id: &AvatarId) -> Result<(), MetadataError> {
        self.entries.insert(owner_key(owner), id.to_string());
        Ok(())
    }

    async fn get_owner(&self, owner: &str) -> Result<Option<AvatarId>, MetadataError> {
        let key = owner_key(owner);
        match self.entries.get(&key) {
            Some(raw) => decode_mapping(&key, raw.value()).map(Some),
            None => Ok(None),
        }
    }

    async fn delete_owner(&self, owner: &str) -> Result<bool, MetadataError> {
        Ok(self.entries.remove(&owner_key(owner)).is_some())
    }
}
