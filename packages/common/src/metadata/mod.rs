mod error;
mod memory;
mod model;
#[cfg(feature = "redis")]
mod redis_store;
mod traits;

pub use error::MetadataError;
pub use memory::MemoryMetadataStore;
pub use model::{AvatarMetadata, metadata_key, owner_key};
#[cfg(feature = "redis")]
pub use redis_store::RedisMetadataStore;
pub use traits::MetadataStore;
