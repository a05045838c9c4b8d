use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{info, warn};

use super::error::MetadataError;
use super::model::{AvatarMetadata, decode_mapping, metadata_key, owner_key};
use super::traits::MetadataStore;
use crate::avatar_id::AvatarId;

/// Redis-backed metadata store.
#[derive(Clone)]
pub struct RedisMetadataStore {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisMetadataStore {
    pub async fn connect(url: &str, key_prefix: impl Into<String>) -> Result<Self, MetadataError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        info!("Connected to Redis metadata store");
        Ok(Self {
            connection,
            key_prefix: key_prefix.into(),
        })
    }

    fn key(&self, key: String) -> String {
        prefixed(&self.key_prefix, key)
    }
}

fn prefixed(prefix: &str, key: String) -> String {
    if prefix.is_empty() {
        key
    } else {
        format!("{prefix}{key}")
    }
}

#[async_trait]
impl MetadataStore for RedisMetadataStore {
    async fn put_metadata(&self, metadata: &AvatarMetadata) -> Result<(), MetadataError> {
        let key = self.key(metadata_key(&metadata.id));
        let json = serde_json::to_string(metadata)?;
        let mut conn = self.connection.clone();
        let _: () = conn.set(&key, json).await.map_err(|e| {
            warn!(key = %key, error = %e, "Redis SET failed");
            e
        })?;
        Ok(())
    }

    async fn get_metadata(&self, id: &AvatarId) -> Result<Option<AvatarMetadata>, MetadataError> {
        let key = self.key(metadata_key(id));
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(&key).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn delete_metadata(&self, id: &AvatarId) -> Result<bool, MetadataError> {
        let key = self.key(metadata_key(id));
        let mut conn = self.connection.clone();
        let removed: u64 = conn.del(&key).await?;
        Ok(removed > 0)
    }

    async fn set_owner(&self, owner: &str, id: &AvatarId) -> Result<(), MetadataError> {
        let key = self.key(owner_key(owner));
        let mut conn = self.connection.clone();
        let _: () = conn.set(&key, id.to_string()).await.map_err(|e| {
            warn!(key = %key, error = %e, "Redis SET failed");
            e
        })?;
        Ok(())
    }

    async fn get_owner(&self, owner: &str) -> Result<Option<AvatarId>, MetadataError> {
        let key = self.key(owner_key(owner));
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(&key).await?;
        raw.map(|v| decode_mapping(&key, &v)).transpose()
    }

    async fn get_owners(
        &self,
        owners: &[String],
    ) -> Result<HashMap<String, AvatarId>, MetadataError> {
        if owners.is_empty() {
            return Ok(HashMap::new());
        }

        let keys: Vec<String> = owners.iter().map(|o| self.key(owner_key(o))).collect();
        let mut conn = self.connection.clone();
        // Explicit MGET: a single key would otherwise be sent as GET.
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        let mut found = HashMap::with_capacity(owners.len());
        for ((owner, key), value) in owners.iter().zip(&keys).zip(values) {
            let Some(raw) = value else { continue };
            match decode_mapping(key, &raw) {
                Ok(id) => {
                    found.insert(owner.clone(), id);
                }
                Err(e) => warn!(owner = %owner, error = %e, "Skipping corrupt owner mapping"),
            }
        }
        Ok(found)
    }

    async fn delete_owner(&self, owner: &str) -> Result<bool, MetadataError> {
        let key = self.key(owner_key(owner));
        let mut conn = self.connection.clone();
        let removed: u64 = conn.del(&key).await?;
        Ok(removed > 0)
    }
}
