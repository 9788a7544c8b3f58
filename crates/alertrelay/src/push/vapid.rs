//! VAPID application server keys.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::SecretKey;
use rand_core::OsRng;
use serde::Serialize;

use super::{PushError, Result};

/// A P-256 VAPID key pair in the URL-safe, unpadded base64 form browsers
/// and push libraries exchange.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidKeys {
    /// Uncompressed public point (65 bytes), handed to browsers.
    pub public_key: String,
    /// Private scalar (32 bytes).
    pub private_key: String,
}

impl std::fmt::Debug for VapidKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidKeys")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl VapidKeys {
    /// Generate a fresh key pair.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_secret(&SecretKey::random(&mut OsRng))
    }

    /// Derive the public key belonging to an encoded private key.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Vapid`] if the private key is not a base64
    /// encoded 32-byte P-256 scalar.
    pub fn public_key_for(private_key: &str) -> Result<String> {
        let bytes = URL_SAFE_NO_PAD
            .decode(private_key.trim_end_matches('='))
            .map_err(|err| PushError::Vapid(format!("private key is not base64: {err}")))?;
        if bytes.len() != 32 {
            return Err(PushError::Vapid(format!(
                "private key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|_| PushError::Vapid("private key is not a valid P-256 scalar".to_string()))?;
        Ok(Self::from_secret(&secret).public_key)
    }

    fn from_secret(secret: &SecretKey) -> Self {
        let public = secret.public_key().to_encoded_point(false);
        Self {
            public_key: URL_SAFE_NO_PAD.encode(public.as_bytes()),
            private_key: URL_SAFE_NO_PAD.encode(secret.to_bytes()),
        }
    }
}
