//! Avatar lifecycle coordination across the blob and metadata stores.

mod context;
mod error;
mod service;

pub use context::OpContext;
pub use error::{AvatarError, Step, UpstreamError};
pub use service::{AvatarOptions, AvatarService, DeleteOutcome, Upload};
