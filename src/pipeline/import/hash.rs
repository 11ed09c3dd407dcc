use base64::Engine;
use sha2::{Digest, Sha256};

/// Compute SHA-256 content hash, base64-encoded.
/// Used as an audit fingerprint for uploaded card images.
pub fn compute_content_hash(content: &[u8]) -> String {
    let hash = Sha256::digest(content);
    base64::engine::general_purpose::STANDARD.encode(hash)
}
