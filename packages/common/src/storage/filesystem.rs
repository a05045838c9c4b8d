use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tempfile::TempPath;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

use super::error::StorageError;
use super::signing::UrlSigner;
use super::traits::{BlobInfo, BlobStore, BoxReader, DEFAULT_CONTENT_TYPE};

/// Route prefix under which the server serves signed blob URLs.
pub const BLOB_ROUTE_PREFIX: &str = "/blobs";

/// Attributes persisted next to each blob.
#[derive(Serialize, Deserialize)]
struct Sidecar {
    content_type: String,
    size: u64,
}

/// Filesystem-backed blob store.
///
/// Blobs live at `{base_path}/{key}` with a `{key}.meta` JSON sidecar holding
/// the content type. Read URLs point back at this service
/// (`{public_url}/blobs/{key}?expires=..&signature=..`) and are checked with
/// [`FilesystemBlobStore::verify_url`].
pub struct FilesystemBlobStore {
    base_path: PathBuf,
    public_url: String,
    signer: UrlSigner,
    max_size: u64,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store.
    pub async fn new(
        base_path: PathBuf,
        public_url: impl Into<String>,
        signing_secret: impl Into<Vec<u8>>,
        max_size: u64,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            public_url: public_url.into().trim_end_matches('/').to_string(),
            signer: UrlSigner::new(signing_secret.into())?,
            max_size,
        })
    }

    /// Compute the filesystem path for a blob key.
    fn blob_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }

    fn sidecar_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.base_path.join(format!("{key}.meta")))
    }

    /// Temporary file for a write in progress. It is deleted when the
    /// returned path is dropped, unless the write is committed first.
    fn temp_file(&self) -> Result<(fs::File, TempPath), StorageError> {
        let (file, path) = tempfile::Builder::new()
            .tempfile_in(self.base_path.join(".tmp"))?
            .into_parts();
        Ok((fs::File::from_std(file), path))
    }

    /// Verify the query parameters of a URL issued by `presign_get`.
    pub fn verify_url(&self, key: &str, expires: i64, signature: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.signer
            .verify(key, expires, signature, Utc::now().timestamp())
    }

    async fn read_sidecar(&self, key: &str) -> Result<Option<Sidecar>, StorageError> {
        match fs::read(self.sidecar_path(key)?).await {
            Ok(raw) => Ok(serde_json::from_slice(&raw).ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keys are `/`-separated segments of `[A-Za-z0-9_-]`.
fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("empty key".into()));
    }
    for segment in key.split('/') {
        if segment.is_empty()
            || !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(StorageError::InvalidKey(format!("{key:?}")));
        }
    }
    Ok(())
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put_stream(
        &self,
        key: &str,
        mut reader: BoxReader,
        content_type: &str,
        size: u64,
    ) -> Result<(), StorageError> {
        let blob_path = self.blob_path(key)?;
        let sidecar_path = self.sidecar_path(key)?;

        if size > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: size,
                limit: self.max_size,
            });
        }

        let (mut temp_file, temp_path) = self.temp_file()?;
        let mut total_bytes: u64 = 0;

        let mut buf = vec![0u8; 64 * 1024]; // 64KB read buffer

        let copied: Result<(), StorageError> = async {
            loop {
                let n = reader.read(&mut buf).await?;
                if n == 0 {
                    break;
                }

                total_bytes += n as u64;
                if total_bytes > size {
                    return Err(StorageError::SizeMismatch {
                        declared: size,
                        actual: total_bytes,
                    });
                }

                temp_file.write_all(&buf[..n]).await?;
            }
            temp_file.flush().await?;
            Ok(())
        }
        .await;
        drop(temp_file);
        copied?;

        if total_bytes != size {
            return Err(StorageError::SizeMismatch {
                declared: size,
                actual: total_bytes,
            });
        }

        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let sidecar = serde_json::to_vec(&Sidecar {
            content_type: content_type.to_string(),
            size,
        })
        .map_err(|e| StorageError::Io(e.into()))?;
        fs::write(&sidecar_path, sidecar).await?;

        if let Err(e) = fs::rename(&temp_path, &blob_path).await {
            let _ = fs::remove_file(&sidecar_path).await;
            return Err(e.into());
        }
        // The temp name no longer exists; skip the delete on drop.
        let _ = temp_path.keep();

        Ok(())
    }

    async fn get_stream(&self, key: &str) -> Result<BoxReader, StorageError> {
        let blob_path = self.blob_path(key)?;
        match fs::File::open(&blob_path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn head(&self, key: &str) -> Result<Option<BlobInfo>, StorageError> {
        let blob_path = self.blob_path(key)?;
        let meta = match fs::metadata(&blob_path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let content_type = self
            .read_sidecar(key)
            .await?
            .map(|s| s.content_type)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        Ok(Some(BlobInfo {
            size: meta.len(),
            content_type,
        }))
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let blob_path = self.blob_path(key)?;
        let deleted = match fs::remove_file(&blob_path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        match fs::remove_file(self.sidecar_path(key)?).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(deleted)
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StorageError> {
        validate_key(key)?;
        let expires = Utc::now().timestamp() + expires_in.as_secs() as i64;
        let signature = self.signer.sign(key, expires);
        Ok(format!(
            "{}{BLOB_ROUTE_PREFIX}/{key}?expires={expires}&signature={signature}",
            self.public_url
        ))
    }
}
