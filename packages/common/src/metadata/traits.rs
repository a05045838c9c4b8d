use std::collections::HashMap;

use async_trait::async_trait;
use tracing::warn;

use super::error::MetadataError;
use super::model::AvatarMetadata;
use crate::avatar_id::AvatarId;

/// Key-value store holding avatar metadata and owner mappings.
///
/// Handles are shared by all requests, so implementations must be safe for
/// concurrent use.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn put_metadata(&self, metadata: &AvatarMetadata) -> Result<(), MetadataError>;

    async fn get_metadata(&self, id: &AvatarId) -> Result<Option<AvatarMetadata>, MetadataError>;

    /// Returns `true` if a record was removed.
    async fn delete_metadata(&self, id: &AvatarId) -> Result<bool, MetadataError>;

    /// Point `owner` at `id`, replacing any previous mapping.
    async fn set_owner(&self, owner: &str, id: &AvatarId) -> Result<(), MetadataError>;

    async fn get_owner(&self, owner: &str) -> Result<Option<AvatarId>, MetadataError>;

    /// Resolve many owners in one call.
    ///
    /// Unmapped owners, and owners whose mapping cannot be read, are absent
    /// from the result. An `Err` means the call as a whole failed.
    async fn get_owners(
        &self,
        owners: &[String],
    ) -> Result<HashMap<String, AvatarId>, MetadataError> {
        let mut found = HashMap::with_capacity(owners.len());
        for owner in owners {
            match self.get_owner(owner).await {
                Ok(Some(id)) => {
                    found.insert(owner.clone(), id);
                }
                Ok(None) => {}
                Err(e) => warn!(owner = %owner, error = %e, "Skipping unreadable owner mapping"),
            }
        }
        Ok(found)
    }

    /// Returns `true` if a mapping was removed.
    async fn delete_owner(&self, owner: &str) -> Result<bool, MetadataError>;
}
