use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Default content type for payloads uploaded without one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Stored attributes of a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    pub size: u64,
    pub content_type: String,
}

/// Key-addressed blob storage with time-limited read URLs.
///
/// Handles are shared by all requests, so implementations must be safe for
/// concurrent use.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key`.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError> {
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        self.put_stream(key, reader, content_type, data.len() as u64)
            .await
    }

    /// Store exactly `size` bytes read from `reader` under `key`.
    ///
    /// Fails with [`StorageError::SizeMismatch`] if the reader yields a
    /// different number of bytes; nothing is left behind in that case.
    async fn put_stream(
        &self,
        key: &str,
        reader: BoxReader,
        content_type: &str,
        size: u64,
    ) -> Result<(), StorageError>;

    /// Retrieve all bytes for a blob.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get_stream(key).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Retrieve a blob as a streaming async reader.
    async fn get_stream(&self, key: &str) -> Result<BoxReader, StorageError>;

    /// Size and content type of a blob, or `None` if absent.
    async fn head(&self, key: &str) -> Result<Option<BlobInfo>, StorageError>;

    /// Check whether a blob exists.
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.head(key).await?.is_some())
    }

    /// Delete a blob.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    /// Backends that cannot tell the difference report `true`.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Issue a URL granting read access to `key` for `expires_in`.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StorageError>;
}
