//! HMAC-SHA256 request signatures.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Key used when neither an HMAC secret nor a challenge secret is configured.
pub const DEFAULT_HMAC_SECRET: &str = "default-hmac-secret";

/// Verifies hex-encoded HMAC-SHA256 signatures.
#[derive(Clone)]
pub struct HmacVerifier {
    key: Vec<u8>,
}

impl HmacVerifier {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// Pick the key: explicit HMAC secret, then the challenge secret, then the default.
    pub fn from_secrets(hmac_secret: Option<&str>, challenge_secret: &str) -> Self {
        let key = hmac_secret
            .filter(|s| !s.is_empty())
            .or_else(|| Some(challenge_secret).filter(|s| !s.is_empty()))
            .unwrap_or(DEFAULT_HMAC_SECRET);
        Self::new(key.as_bytes())
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length")
    }

    /// Hex signature of `data`.
    pub fn sign(&self, data: &[u8]) -> String {
        let mut mac = self.mac();
        mac.update(data);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time check of `signature` (hex) against `data`.
    /// Malformed hex is a mismatch.
    pub fn verify(&self, data: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(data);
        mac.verify_slice(&expected).is_ok()
    }
}

impl std::fmt::Debug for HmacVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacVerifier").finish_non_exhaustive()
    }
}
