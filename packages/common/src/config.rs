use std::path::PathBuf;

use serde::Deserialize;

/// Which blob store implementation to construct.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    S3,
}

/// App-level blob storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageAppConfig {
    /// Default: filesystem.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Lifetime of issued read URLs. Default: 3600.
    #[serde(default = "default_url_ttl_secs")]
    pub url_ttl_secs: u64,
    #[serde(default)]
    pub filesystem: FilesystemStorageConfig,
    #[serde(default)]
    pub s3: S3StorageConfig,
}

fn default_url_ttl_secs() -> u64 {
    3600
}

impl Default for StorageAppConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            url_ttl_secs: default_url_ttl_secs(),
            filesystem: FilesystemStorageConfig::default(),
            s3: S3StorageConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilesystemStorageConfig {
    /// Root directory for blobs. Default: "./data/blobs".
    #[serde(default = "default_fs_path")]
    pub path: PathBuf,
    /// Externally reachable base URL of this service, used in signed URLs.
    /// Default: "http://127.0.0.1:8080".
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Key for signing blob URLs. Must be overridden outside development.
    #[serde(default = "default_signing_secret")]
    pub signing_secret: String,
}

fn default_fs_path() -> PathBuf {
    PathBuf::from("./data/blobs")
}
fn default_public_url() -> String {
    "http://127.0.0.1:8080".into()
}
fn default_signing_secret() -> String {
    "dev-signing-secret-change-me".into()
}

impl Default for FilesystemStorageConfig {
    fn default() -> Self {
        Self {
            path: default_fs_path(),
            public_url: default_public_url(),
            signing_secret: default_signing_secret(),
        }
    }
}

/// S3-compatible object storage (Cloudflare R2 by default).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct S3StorageConfig {
    #[serde(default)]
    pub bucket: String,
    /// R2 account id, used to derive the endpoint when `endpoint` is empty.
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub endpoint: String,
    /// Default: "auto".
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default)]
    pub path_style: bool,
}

fn default_region() -> String {
    "auto".into()
}

impl S3StorageConfig {
    /// Configured endpoint, or the R2 endpoint for `account_id`.
    pub fn resolved_endpoint(&self) -> String {
        if self.endpoint.is_empty() {
            format!("https://{}.r2.cloudflarestorage.com", self.account_id)
        } else {
            self.endpoint.clone()
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetadataBackend {
    #[default]
    Redis,
    Memory,
}

/// App-level metadata store configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct MetadataAppConfig {
    /// Default: redis.
    #[serde(default)]
    pub backend: MetadataBackend,
    /// Redis connection URL. Default: "redis://localhost:6379".
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Prepended to every key. Default: empty.
    #[serde(default)]
    pub key_prefix: String,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".into()
}

impl Default for MetadataAppConfig {
    fn default() -> Self {
        Self {
            backend: MetadataBackend::default(),
            url: default_redis_url(),
            key_prefix: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentityBackend {
    #[default]
    GrpcWeb,
    Jwt,
}

/// App-level identity verification configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct IdentityAppConfig {
    /// Default: grpc_web.
    #[serde(default)]
    pub backend: IdentityBackend,
    /// User service address; `https://` is assumed without a scheme.
    /// Default: "localhost:50051".
    #[serde(default = "default_identity_address")]
    pub address: String,
    /// Default: 10.
    #[serde(default = "default_identity_timeout_secs")]
    pub timeout_secs: u64,
    /// HS256 secret for the jwt backend.
    #[serde(default)]
    pub jwt_secret: String,
}

fn default_identity_address() -> String {
    "localhost:50051".into()
}
fn default_identity_timeout_secs() -> u64 {
    10
}

impl Default for IdentityAppConfig {
    fn default() -> Self {
        Self {
            backend: IdentityBackend::default(),
            address: default_identity_address(),
            timeout_secs: default_identity_timeout_secs(),
            jwt_secret: String::new(),
        }
    }
}
