use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::error::IdentityError;
use super::traits::{Identity, IdentityVerifier};

/// JWT Claims structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Username
    pub uid: String, // User ID
    #[serde(default)]
    pub email: String,
    pub exp: usize, // Expiration timestamp
}

/// Verifies HS256 tokens signed with a shared secret, for deployments where
/// the user directory issues JWTs instead of answering RPCs.
pub struct JwtVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtVerifier {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Sign a token for `identity` valid for `ttl`.
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, IdentityError> {
        let expiration = (Utc::now() + ttl).timestamp().max(0);
        let claims = Claims {
            sub: identity.username.clone(),
            uid: identity.id.clone(),
            email: identity.email.clone(),
            exp: expiration as usize,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| IdentityError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify_token(&self, token: &str) -> Result<Identity, IdentityError> {
        let token_data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| IdentityError::Rejected(e.to_string()))?;
        let claims = token_data.claims;
        if claims.sub.is_empty() {
            return Err(IdentityError::Rejected("token has no subject".into()));
        }
        Ok(Identity {
            id: claims.uid,
            username: claims.sub,
            email: claims.email,
        })
    }
}
