//! Expiring signed links for backends that cannot presign on their own.
//!
//! A link carries the storage key, an `exp` unix timestamp and a `sig`
//! HMAC-SHA256 over both. The file route recomputes the MAC and refuses the
//! request once `exp` has passed.

use crate::{StorageError, StorageResult};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Link has expired")]
    Expired,
    #[error("Link signature is invalid")]
    Invalid,
}

#[derive(Clone)]
pub struct UrlSigner {
    mac: HmacSha256,
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> StorageResult<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_ref())
            .map_err(|e| StorageError::ConfigError(format!("Invalid signing key: {}", e)))?;
        Ok(Self { mac })
    }

    fn keyed(&self, storage_key: &str, expires_at: i64) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(storage_key.as_bytes());
        mac.update(b"\n");
        mac.update(expires_at.to_string().as_bytes());
        mac
    }

    /// Hex-encoded signature for `storage_key` valid until `expires_at`.
    pub fn sign(&self, storage_key: &str, expires_at: i64) -> String {
        hex::encode(self.keyed(storage_key, expires_at).finalize().into_bytes())
    }

    /// `{base_url}/{key}?exp=..&sig=..` valid until `expires_at`.
    pub fn signed_url(&self, base_url: &str, storage_key: &str, expires_at: i64) -> String {
        format!(
            "{}/{}?exp={}&sig={}",
            base_url.trim_end_matches('/'),
            storage_key,
            expires_at,
            self.sign(storage_key, expires_at)
        )
    }

    /// Unix timestamp `expires_in` from now.
    pub fn expiry_from_now(expires_in: Duration) -> i64 {
        let secs = i64::try_from(expires_in.as_secs()).unwrap_or(i64::MAX);
        Utc::now().timestamp().saturating_add(secs)
    }

    /// Check a link at unix time `now`. Signatures compare in constant time.
    pub fn verify(
        &self,
        storage_key: &str,
        expires_at: i64,
        signature: &str,
        now: i64,
    ) -> Result<(), SignatureError> {
        let signature = hex::decode(signature).map_err(|_| SignatureError::Invalid)?;
        self.keyed(storage_key, expires_at)
            .verify_slice(&signature)
            .map_err(|_| SignatureError::Invalid)?;
        if now >= expires_at {
            return Err(SignatureError::Expired);
        }
        Ok(())
    }
}
