use std::sync::Arc;
use std::time::Duration;

use common::identity::IdentityVerifier;
use common::metadata::MetadataStore;
use common::storage::BlobStore;
use common::storage::filesystem::FilesystemBlobStore;

use crate::avatar::{AvatarOptions, AvatarService};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub avatars: Arc<AvatarService>,
    pub identity: Arc<dyn IdentityVerifier>,
    /// Set when blobs live on local disk and `/blobs` is served by us.
    pub local_blobs: Option<Arc<FilesystemBlobStore>>,
    /// Outbound client for upload-from-URL.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        blobs: Arc<dyn BlobStore>,
        local_blobs: Option<Arc<FilesystemBlobStore>>,
        metadata: Arc<dyn MetadataStore>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Result<Self, reqwest::Error> {
        let options = AvatarOptions {
            url_ttl: Duration::from_secs(config.storage.url_ttl_secs),
            retire_previous: config.avatar.retire_previous_on_upload,
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.avatar.remote_fetch_timeout_secs))
            .build()?;

        Ok(Self {
            avatars: Arc::new(AvatarService::new(blobs, metadata, options)),
            config: Arc::new(config),
            identity,
            local_blobs,
            http,
        })
    }
}
