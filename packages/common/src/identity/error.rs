use thiserror::Error;

/// Errors from verifying a bearer credential.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The credential is invalid, expired, or unknown to the directory.
    #[error("token rejected: {0}")]
    Rejected(String),

    #[error("identity service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity service returned HTTP {0}")]
    Status(u16),

    #[error("malformed identity response: {0}")]
    Protocol(String),
}

impl IdentityError {
    /// `true` when the caller's credential is at fault rather than the
    /// identity service.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}
