use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::AvatarId;
use common::metadata::{AvatarMetadata, MetadataError, MetadataStore};
use common::storage::{BlobStore, BoxReader, DEFAULT_CONTENT_TYPE};
use futures::future::join_all;
use tracing::{error, info, warn};

use super::context::OpContext;
use super::error::{AvatarError, Step, UpstreamError};

#[derive(Debug, Clone)]
pub struct AvatarOptions {
    /// Lifetime of issued read URLs.
    pub url_ttl: Duration,
    /// Remove the owner's previous blob and metadata after a successful
    /// re-upload.
    pub retire_previous: bool,
}

impl Default for AvatarOptions {
    fn default() -> Self {
        Self {
            url_ttl: Duration::from_secs(3600),
            retire_previous: false,
        }
    }
}

/// Payload handed to [`AvatarService::add`].
pub struct Upload {
    pub payload: BoxReader,
    pub filename: String,
    pub content_type: Option<String>,
    /// Exact number of bytes `payload` yields.
    pub size: u64,
}

/// Result of a successful delete.
#[derive(Debug)]
pub struct DeleteOutcome {
    pub id: AvatarId,
    /// Cleanup steps that failed after the blob was removed.
    pub residual: Vec<Step>,
}

/// How far an add got before failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddStage {
    Started,
    BlobWritten,
    MetadataWritten,
    /// The mapping write was abandoned mid-flight and may have landed.
    MappingAttempted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Blob,
    Metadata,
    Mapping,
    /// Remove the mapping only while it still points at this avatar.
    MappingIfOwned,
}

impl Removal {
    fn step(self) -> Step {
        match self {
            Self::Blob => Step::Blob,
            Self::Metadata => Step::Metadata,
            Self::Mapping | Self::MappingIfOwned => Step::Mapping,
        }
    }
}

const DELETE_CLEANUP: &[Removal] = &[Removal::Metadata, Removal::Mapping];
const RETIRE: &[Removal] = &[Removal::Blob, Removal::Metadata];

impl AddStage {
    /// Compensating deletes for this stage, in reverse write order.
    fn compensations(self) -> &'static [Removal] {
        match self {
            Self::Started => &[],
            Self::BlobWritten => &[Removal::Blob],
            Self::MetadataWritten => &[Removal::Metadata, Removal::Blob],
            Self::MappingAttempted => &[Removal::MappingIfOwned, Removal::Metadata, Removal::Blob],
        }
    }
}

#[derive(Clone)]
struct Stores {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
}

impl Stores {
    async fn remove(&self, removal: Removal, id: &AvatarId, owner: &str) -> Result<(), UpstreamError> {
        match removal {
            Removal::Blob => {
                self.blobs.delete(&id.blob_key()).await?;
            }
            Removal::Metadata => {
                self.metadata.delete_metadata(id).await?;
            }
            Removal::Mapping => {
                self.metadata.delete_owner(owner).await?;
            }
            Removal::MappingIfOwned => self.release_mapping(owner, id).await?,
        }
        Ok(())
    }

    async fn release_mapping(&self, owner: &str, id: &AvatarId) -> Result<(), MetadataError> {
        if self.metadata.get_owner(owner).await? == Some(*id) {
            self.metadata.delete_owner(owner).await?;
        }
        Ok(())
    }

    /// Attempt every removal once; returns the steps that failed.
    async fn remove_all(
        &self,
        removals: &[Removal],
        id: AvatarId,
        owner: &str,
        purpose: &'static str,
    ) -> Vec<Step> {
        let mut residual = Vec::new();
        for &removal in removals {
            if let Err(e) = self.remove(removal, &id, owner).await {
                error!(
                    avatar_id = %id,
                    owner = %owner,
                    step = %removal.step(),
                    error = %e,
                    "{purpose} failed"
                );
                residual.push(removal.step());
            }
        }
        residual
    }
}

/// Coordinates avatar writes, reads and deletes across the blob and metadata
/// stores.
///
/// Writes happen in the order blob, metadata, mapping. A failed write
/// unwinds the earlier ones with compensating deletes.
pub struct AvatarService {
    stores: Stores,
    options: AvatarOptions,
}

fn require_owner(owner: &str) -> Result<&str, AvatarError> {
    if owner.trim().is_empty() {
        return Err(AvatarError::InvalidInput("owner must not be empty".into()));
    }
    Ok(owner)
}

impl AvatarService {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        options: AvatarOptions,
    ) -> Self {
        Self {
            stores: Stores { blobs, metadata },
            options,
        }
    }

    pub fn options(&self) -> &AvatarOptions {
        &self.options
    }

    /// Run removals on a detached task, so they finish even if the caller
    /// is dropped.
    async fn run_detached(
        &self,
        removals: &'static [Removal],
        id: AvatarId,
        owner: &str,
        purpose: &'static str,
    ) -> Vec<Step> {
        if removals.is_empty() {
            return Vec::new();
        }
        let stores = self.stores.clone();
        let owner = owner.to_string();
        let task =
            tokio::spawn(async move { stores.remove_all(removals, id, &owner, purpose).await });
        match task.await {
            Ok(residual) => residual,
            Err(e) => {
                error!(avatar_id = %id, error = %e, "{purpose} task aborted");
                removals.iter().map(|r| r.step()).collect()
            }
        }
    }

    async fn fail_write(
        &self,
        stage: AddStage,
        step: Step,
        source: UpstreamError,
        id: AvatarId,
        owner: &str,
    ) -> AvatarError {
        warn!(avatar_id = %id, owner = %owner, step = %step, error = %source, "Avatar write failed");
        let residual = self
            .run_detached(stage.compensations(), id, owner, "Compensating delete")
            .await;
        AvatarError::UpstreamWriteFailed {
            step,
            source,
            residual,
        }
    }

    async fn abandon(&self, stage: AddStage, id: AvatarId, owner: &str) -> AvatarError {
        warn!(avatar_id = %id, owner = %owner, ?stage, "Avatar upload cancelled");
        self.run_detached(stage.compensations(), id, owner, "Compensating delete")
            .await;
        AvatarError::Cancelled
    }

    /// Store a new avatar for `owner` and point the owner at it.
    pub async fn add(
        &self,
        ctx: &OpContext,
        owner: &str,
        upload: Upload,
    ) -> Result<AvatarId, AvatarError> {
        let owner = require_owner(owner)?;
        if ctx.is_done() {
            return Err(AvatarError::Cancelled);
        }

        let Upload {
            payload,
            filename,
            content_type,
            size,
        } = upload;
        let content_type = content_type
            .map(|ct| ct.trim().to_string())
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let id = AvatarId::generate();
        let key = id.blob_key();

        // A cancelled blob write may still have landed.
        match ctx
            .guard(self.stores.blobs.put_stream(&key, payload, &content_type, size))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(self
                    .fail_write(AddStage::Started, Step::Blob, e.into(), id, owner)
                    .await);
            }
            Err(_) => return Err(self.abandon(AddStage::BlobWritten, id, owner).await),
        }

        let record = AvatarMetadata {
            id,
            owner: owner.to_string(),
            original_name: filename,
            size_bytes: size,
            mime_type: content_type,
            created_at: Utc::now(),
        };
        match ctx.guard(self.stores.metadata.put_metadata(&record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(self
                    .fail_write(AddStage::BlobWritten, Step::Metadata, e.into(), id, owner)
                    .await);
            }
            Err(_) => return Err(self.abandon(AddStage::MetadataWritten, id, owner).await),
        }

        let previous = if self.options.retire_previous {
            match ctx.guard(self.stores.metadata.get_owner(owner)).await {
                Ok(Ok(previous)) => previous,
                Ok(Err(e)) => {
                    warn!(owner = %owner, error = %e, "Could not read previous avatar, keeping it");
                    None
                }
                Err(_) => return Err(self.abandon(AddStage::MetadataWritten, id, owner).await),
            }
        } else {
            None
        };

        match ctx.guard(self.stores.metadata.set_owner(owner, &id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(self
                    .fail_write(AddStage::MetadataWritten, Step::Mapping, e.into(), id, owner)
                    .await);
            }
            Err(_) => return Err(self.abandon(AddStage::MappingAttempted, id, owner).await),
        }

        info!(avatar_id = %id, owner = %owner, size, "Avatar stored");

        if let Some(previous) = previous.filter(|p| *p != id) {
            let residual = self
                .run_detached(RETIRE, previous, owner, "Retiring previous avatar")
                .await;
            if residual.is_empty() {
                info!(avatar_id = %previous, owner = %owner, "Previous avatar retired");
            }
        }

        Ok(id)
    }

    async fn lookup(&self, ctx: &OpContext, owner: &str) -> Result<AvatarId, AvatarError> {
        ctx.guard(self.stores.metadata.get_owner(owner))
            .await?
            .map_err(AvatarError::read_failed(Step::Mapping))?
            .ok_or_else(|| AvatarError::NotFound {
                owner: owner.to_string(),
            })
    }

    /// Time-limited read URL for `owner`'s current avatar.
    ///
    /// Does not check that the blob exists.
    pub async fn get_url(&self, ctx: &OpContext, owner: &str) -> Result<String, AvatarError> {
        let owner = require_owner(owner)?;
        let id = self.lookup(ctx, owner).await?;
        ctx.guard(
            self.stores
                .blobs
                .presign_get(&id.blob_key(), self.options.url_ttl),
        )
        .await?
        .map_err(AvatarError::read_failed(Step::Blob))
    }

    /// Mappings for `owners`. A failed batch read falls back to one lookup
    /// per owner, and owners that still cannot be read are left out.
    async fn resolve_owners(&self, owners: &[String]) -> HashMap<String, AvatarId> {
        let metadata = &self.stores.metadata;
        match metadata.get_owners(owners).await {
            Ok(ids) => return ids,
            Err(e) => warn!(owners = owners.len(), error = %e, "Batch owner lookup failed, resolving one by one"),
        }

        let mut ids = HashMap::with_capacity(owners.len());
        for owner in owners {
            match metadata.get_owner(owner).await {
                Ok(Some(id)) => {
                    ids.insert(owner.clone(), id);
                }
                Ok(None) => {}
                Err(e) => warn!(owner = %owner, error = %e, "Omitting avatar, mapping could not be read"),
            }
        }
        ids
    }

    /// Read URLs for every owner that has an avatar.
    ///
    /// Owners without a readable mapping or an issuable URL are left out.
    pub async fn get_urls(
        &self,
        ctx: &OpContext,
        owners: &BTreeSet<String>,
    ) -> Result<HashMap<String, String>, AvatarError> {
        if owners.is_empty() {
            return Err(AvatarError::InvalidInput(
                "at least one owner is required".into(),
            ));
        }

        let owners: Vec<String> = owners.iter().cloned().collect();
        let ids = ctx.guard(self.resolve_owners(&owners)).await?;

        let ttl = self.options.url_ttl;
        let presigns = ids.into_iter().map(|(owner, id)| async move {
            let url = self.stores.blobs.presign_get(&id.blob_key(), ttl).await;
            (owner, id, url)
        });
        let results = ctx.guard(join_all(presigns)).await?;

        let mut urls = HashMap::with_capacity(results.len());
        for (owner, id, url) in results {
            match url {
                Ok(url) => {
                    urls.insert(owner, url);
                }
                Err(e) => {
                    warn!(owner = %owner, avatar_id = %id, error = %e, "Omitting avatar, URL could not be issued");
                }
            }
        }
        Ok(urls)
    }

    /// Remove `owner`'s avatar.
    ///
    /// The blob delete must succeed. Metadata and mapping cleanup failures
    /// are logged and returned in the outcome.
    pub async fn delete(&self, ctx: &OpContext, owner: &str) -> Result<DeleteOutcome, AvatarError> {
        let owner = require_owner(owner)?;
        let id = self.lookup(ctx, owner).await?;

        let existed = ctx
            .guard(self.stores.blobs.delete(&id.blob_key()))
            .await?
            .map_err(|e| AvatarError::UpstreamDeleteFailed {
                step: Step::Blob,
                source: e.into(),
            })?;
        if !existed {
            warn!(avatar_id = %id, owner = %owner, "Avatar blob was already gone");
        }

        let residual = self
            .run_detached(DELETE_CLEANUP, id, owner, "Post-delete cleanup")
            .await;

        info!(avatar_id = %id, owner = %owner, residual = residual.len(), "Avatar deleted");
        Ok(DeleteOutcome { id, residual })
    }
}
