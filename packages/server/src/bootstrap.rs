//! Construct the storage and identity adapters selected by configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use common::config::{
    IdentityAppConfig, IdentityBackend, MetadataAppConfig, MetadataBackend, StorageAppConfig,
    StorageBackend,
};
use common::identity::{GrpcWebVerifier, IdentityVerifier, JwtVerifier};
use common::metadata::{MemoryMetadataStore, MetadataStore};
use common::storage::BlobStore;
use common::storage::filesystem::FilesystemBlobStore;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::state::AppState;

pub async fn build_state(config: AppConfig) -> Result<AppState> {
    let (blobs, local_blobs) =
        build_blob_store(&config.storage, config.server.max_upload_bytes).await?;
    let metadata = build_metadata_store(&config.metadata).await?;
    let identity = build_identity_verifier(&config.identity)?;

    AppState::new(config, blobs, local_blobs, metadata, identity)
        .context("failed to build HTTP client")
}

type BlobStores = (Arc<dyn BlobStore>, Option<Arc<FilesystemBlobStore>>);

async fn build_blob_store(config: &StorageAppConfig, max_size: u64) -> Result<BlobStores> {
    match config.backend {
        StorageBackend::Filesystem => {
            let fs = &config.filesystem;
            let store = FilesystemBlobStore::new(
                fs.path.clone(),
                fs.public_url.clone(),
                fs.signing_secret.clone(),
                max_size,
            )
            .await
            .with_context(|| format!("failed to open blob directory {}", fs.path.display()))?;
            info!(path = %fs.path.display(), "Using filesystem blob store");
            let store = Arc::new(store);
            Ok((store.clone(), Some(store)))
        }
        StorageBackend::S3 => build_s3(config),
    }
}

#[cfg(feature = "object-storage")]
fn build_s3(config: &StorageAppConfig) -> Result<BlobStores> {
    use common::storage::s3::S3BlobStore;

    let store = S3BlobStore::new(&config.s3).context("failed to configure object storage")?;
    info!(
        bucket = %config.s3.bucket,
        endpoint = %config.s3.resolved_endpoint(),
        "Using object storage"
    );
    Ok((Arc::new(store), None))
}

#[cfg(not(feature = "object-storage"))]
fn build_s3(_config: &StorageAppConfig) -> Result<BlobStores> {
    anyhow::bail!("storage.backend = \"s3\" requires the `object-storage` feature")
}

async fn build_metadata_store(config: &MetadataAppConfig) -> Result<Arc<dyn MetadataStore>> {
    match config.backend {
        MetadataBackend::Memory => {
            warn!("Using in-memory metadata store; avatars will not survive a restart");
            Ok(Arc::new(MemoryMetadataStore::new()))
        }
        MetadataBackend::Redis => build_redis(config).await,
    }
}

#[cfg(feature = "redis")]
async fn build_redis(config: &MetadataAppConfig) -> Result<Arc<dyn MetadataStore>> {
    use common::metadata::RedisMetadataStore;

    let store = RedisMetadataStore::connect(&config.url, config.key_prefix.clone())
        .await
        .context("failed to connect to Redis")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
async fn build_redis(_config: &MetadataAppConfig) -> Result<Arc<dyn MetadataStore>> {
    anyhow::bail!("metadata.backend = \"redis\" requires the `redis` feature")
}

fn build_identity_verifier(config: &IdentityAppConfig) -> Result<Arc<dyn IdentityVerifier>> {
    match config.backend {
        IdentityBackend::GrpcWeb => {
            let verifier =
                GrpcWebVerifier::new(&config.address, Duration::from_secs(config.timeout_secs))
                    .context("failed to build identity client")?;
            info!(endpoint = %verifier.endpoint(), "Using gRPC-Web identity verifier");
            Ok(Arc::new(verifier))
        }
        IdentityBackend::Jwt => {
            if config.jwt_secret.is_empty() {
                anyhow::bail!("identity.jwt_secret must be set for the jwt backend");
            }
            Ok(Arc::new(JwtVerifier::new(config.jwt_secret.as_bytes())))
        }
    }
}
