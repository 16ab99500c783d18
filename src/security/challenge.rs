//! JavaScript proof-of-work challenge.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// A generated challenge: the snippet sent to the client and the answer it should compute.
#[derive(Debug, Clone)]
pub struct JsChallenge {
    pub challenge: String,
    pub answer: String,
    pub script: String,
}

impl JsChallenge {
    /// Random 16-byte challenge; the answer is `hex(sha256(challenge + secret))`.
    pub fn generate(secret: &str) -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        let challenge = hex::encode(bytes);
        let answer = Self::expected_answer(&challenge, secret);

        let script = format!(
            r#"
const challenge = '{challenge}';
const secret = '{secret}';
async function solve() {{
    const encoder = new TextEncoder();
    const data = encoder.encode(challenge + secret);
    const hashBuffer = await crypto.subtle.digest('SHA-256', data);
    const hashArray = Array.from(new Uint8Array(hashBuffer));
    return hashArray.map(b => b.toString(16).padStart(2, '0')).join('');
}}
"#
        );

        Self {
            challenge,
            answer,
            script,
        }
    }

    pub fn expected_answer(challenge: &str, secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(challenge.as_bytes());
        hasher.update(secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}
