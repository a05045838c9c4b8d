mod error;
mod signing;
mod traits;

pub mod filesystem;
#[cfg(feature = "object-storage")]
pub mod s3;

pub use error::StorageError;
pub use signing::UrlSigner;
pub use traits::{BlobInfo, BlobStore, BoxReader, DEFAULT_CONTENT_TYPE};
