//! Opaque session and refresh token generation.
//!
//! Tokens are 32 random bytes, base64url-encoded. Only their SHA-256
//! digest is persisted; the digest of a presented token is the lookup
//! key, so revocation takes effect on the next request.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Generate a cryptographically random opaque token
/// (32 bytes → base64url-encoded, no padding).
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rand::Rng::random(&mut rng);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hash of a raw token, hex-encoded.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// A freshly issued session/refresh token pair with their digests.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub session_token: String,
    pub session_hash: String,
    pub refresh_token: String,
    pub refresh_hash: String,
}

impl IssuedTokens {
    pub fn generate() -> Self {
        let session_token = generate_token();
        let refresh_token = generate_token();
        Self {
            session_hash: hash_token(&session_token),
            refresh_hash: hash_token(&refresh_token),
            session_token,
            refresh_token,
        }
    }
}
