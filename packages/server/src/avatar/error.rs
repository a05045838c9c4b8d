use std::fmt;

use common::metadata::MetadataError;
use common::storage::StorageError;
use thiserror::Error;

/// External call made by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Blob,
    Metadata,
    Mapping,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Blob => "avatar blob",
            Self::Metadata => "avatar metadata",
            Self::Mapping => "owner mapping",
        })
    }
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("no avatar for {owner:?}")]
    NotFound { owner: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A write failed. Compensation has already run; `residual` lists the
    /// compensating deletes that themselves failed.
    #[error("failed to write {step}: {source}")]
    UpstreamWriteFailed {
        step: Step,
        source: UpstreamError,
        residual: Vec<Step>,
    },

    #[error("failed to delete {step}: {source}")]
    UpstreamDeleteFailed { step: Step, source: UpstreamError },

    #[error("failed to read {step}: {source}")]
    UpstreamReadFailed { step: Step, source: UpstreamError },

    #[error("operation cancelled")]
    Cancelled,
}

impl AvatarError {
    pub(crate) fn read_failed<E: Into<UpstreamError>>(step: Step) -> impl FnOnce(E) -> Self {
        move |e| Self::UpstreamReadFailed {
            step,
            source: e.into(),
        }
    }
}
