use common::config::{IdentityAppConfig, MetadataAppConfig, StorageAppConfig};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on a single coordinator operation.
    pub request_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
    pub max_upload_bytes: u64,
    pub cors: CorsConfig,
}

/// Avatar API behaviour switches.
#[derive(Debug, Deserialize, Clone)]
pub struct AvatarConfig {
    /// Delete the previous avatar after a successful re-upload. Default: false.
    #[serde(default)]
    pub retire_previous_on_upload: bool,
    /// Serve `POST /api/avatars` without a token. Default: true.
    #[serde(default = "default_public_batch_lookup")]
    pub public_batch_lookup: bool,
    /// Timeout for downloading an image in upload-from-URL. Default: 15.
    #[serde(default = "default_remote_fetch_timeout_secs")]
    pub remote_fetch_timeout_secs: u64,
    /// Maximum distinct usernames per batch lookup. Default: 100.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_public_batch_lookup() -> bool {
    true
}
fn default_remote_fetch_timeout_secs() -> u64 {
    15
}
fn default_max_batch_size() -> usize {
    100
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            retire_previous_on_upload: false,
            public_batch_lookup: default_public_batch_lookup(),
            remote_fetch_timeout_secs: default_remote_fetch_timeout_secs(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageAppConfig,
    #[serde(default)]
    pub metadata: MetadataAppConfig,
    #[serde(default)]
    pub identity: IdentityAppConfig,
    #[serde(default)]
    pub avatar: AvatarConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("AVATARS_CONFIG").unwrap_or_else(|_| "config/config".into());

        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("server.shutdown_timeout_secs", 30)?
            .set_default("server.max_upload_bytes", 10 * 1024 * 1024)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            // Load from config/config.toml (or $AVATARS_CONFIG)
            .add_source(File::with_name(&path).required(false))
            // Override from environment (e.g., AVATARS__STORAGE__S3__BUCKET)
            .add_source(
                Environment::with_prefix("AVATARS")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors.allow_origins")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}
