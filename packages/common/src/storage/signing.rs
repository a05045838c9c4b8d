use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::error::StorageError;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies self-served blob URLs.
///
/// The signature is a hex encoded HMAC-SHA256, keyed with a server secret,
/// over `{key}\n{expires}`.
#[derive(Clone)]
pub struct UrlSigner {
    mac: HmacSha256,
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, StorageError> {
        let mac = HmacSha256::new_from_slice(secret.as_ref())
            .map_err(|e| StorageError::Backend(format!("unusable signing secret: {e}")))?;
        Ok(Self { mac })
    }

    fn keyed(&self, key: &str, expires: i64) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac
    }

    pub fn sign(&self, key: &str, expires: i64) -> String {
        hex::encode(self.keyed(key, expires).finalize().into_bytes())
    }

    /// Check `signature` for `key`/`expires` at time `now` (unix seconds).
    pub fn verify(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: i64,
    ) -> Result<(), StorageError> {
        let signature = hex::decode(signature).map_err(|_| StorageError::InvalidSignature)?;
        self.keyed(key, expires)
            .verify_slice(&signature)
            .map_err(|_| StorageError::InvalidSignature)?;
        if now > expires {
            return Err(StorageError::LinkExpired);
        }
        Ok(())
    }
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}
