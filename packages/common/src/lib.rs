pub mod avatar_id;
pub mod config;
pub mod identity;
pub mod metadata;
pub mod storage;

pub use avatar_id::AvatarId;
