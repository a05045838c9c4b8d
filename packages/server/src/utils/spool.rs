use bytes::Bytes;
use common::storage::BoxReader;
use futures::{Stream, StreamExt};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

use crate::error::AppError;

/// Temporary file holding an incoming upload until its exact size is known.
///
/// The file is deleted when the spool is dropped, including when the request
/// future is abandoned mid-stream.
pub struct SpooledUpload {
    path: TempPath,
}

impl SpooledUpload {
    pub fn new() -> Result<Self, AppError> {
        let file = tempfile::Builder::new()
            .prefix("avatar-upload-")
            .tempfile()
            .map_err(|e| AppError::Internal(format!("Failed to create temp file: {e}")))?;
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    /// Write `stream` to disk, failing once more than `max_size` bytes arrive.
    /// Returns the number of bytes written.
    pub async fn fill<S, E, F>(&self, stream: S, max_size: u64, on_error: F) -> Result<u64, AppError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        F: Fn(E) -> AppError,
    {
        let mut stream = std::pin::pin!(stream);
        let mut file = tokio::fs::File::create(&self.path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to open temp file: {e}")))?;

        let mut total: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(&on_error)?;
            total += chunk.len() as u64;
            if total > max_size {
                return Err(AppError::PayloadTooLarge { limit: max_size });
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| AppError::Internal(format!("Temp file write failed: {e}")))?;
        }

        file.flush()
            .await
            .map_err(|e| AppError::Internal(format!("Temp file flush failed: {e}")))?;
        Ok(total)
    }

    pub async fn open(&self) -> Result<BoxReader, AppError> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to reopen temp file: {e}")))?;
        Ok(Box::new(file))
    }
}
