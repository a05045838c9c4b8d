use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::IdentityError;

/// A verified caller as reported by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub email: String,
}

/// Resolves a bearer credential to a known identity.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<Identity, IdentityError>;
}
