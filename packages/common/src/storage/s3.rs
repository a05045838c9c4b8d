use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::error::StorageError;
use super::traits::{BlobInfo, BlobStore, BoxReader, DEFAULT_CONTENT_TYPE};
use crate::config::S3StorageConfig;

/// Blob store backed by an S3-compatible bucket (Cloudflare R2 by default).
pub struct S3BlobStore {
    bucket: Box<Bucket>,
}

impl S3BlobStore {
    pub fn new(config: &S3StorageConfig) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.resolved_endpoint(),
        };
        let credentials = Credentials::new(
            Some(&config.access_key_id),
            Some(&config.secret_access_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials)?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }
        Ok(Self { bucket })
    }
}

/// Map a non-2xx status to an error; `None` for 404.
fn check_status(key: &str, status: u16) -> Result<Option<()>, StorageError> {
    match status {
        200..=299 => Ok(Some(())),
        404 => Ok(None),
        other => Err(StorageError::Backend(format!(
            "unexpected status {other} for {key}"
        ))),
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_stream(
        &self,
        key: &str,
        reader: BoxReader,
        content_type: &str,
        size: u64,
    ) -> Result<(), StorageError> {
        // Read one byte past the declared size to detect oversized payloads.
        let mut data = Vec::with_capacity(size as usize);
        reader.take(size + 1).read_to_end(&mut data).await?;
        if data.len() as u64 != size {
            return Err(StorageError::SizeMismatch {
                declared: size,
                actual: data.len() as u64,
            });
        }

        let response = self
            .bucket
            .put_object_with_content_type(key, &data, content_type)
            .await?;
        match check_status(key, response.status_code())? {
            Some(()) => {
                debug!(key, size, "Uploaded object");
                Ok(())
            }
            None => Err(StorageError::Backend(format!("bucket missing for {key}"))),
        }
    }

    async fn get_stream(&self, key: &str) -> Result<BoxReader, StorageError> {
        let response = self.bucket.get_object(key).await?;
        match check_status(key, response.status_code())? {
            Some(()) => Ok(Box::new(Cursor::new(response.bytes().to_vec()))),
            None => Err(StorageError::NotFound(key.to_string())),
        }
    }

    async fn head(&self, key: &str) -> Result<Option<BlobInfo>, StorageError> {
        let (head, status) = self.bucket.head_object(key).await?;
        if check_status(key, status)?.is_none() {
            return Ok(None);
        }
        Ok(Some(BlobInfo {
            size: head.content_length.unwrap_or_default().max(0) as u64,
            content_type: head
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        }))
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let response = self.bucket.delete_object(key).await?;
        // S3 answers 204 whether or not the key existed.
        Ok(check_status(key, response.status_code())?.is_some())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StorageError> {
        let secs = u32::try_from(expires_in.as_secs()).unwrap_or(u32::MAX);
        Ok(self.bucket.presign_get(key, secs, None).await?)
    }
}
