pub mod perceptual;

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of an in-memory image, hex encoded.
pub fn compute_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    for chunk in bytes.chunks(64 * 1024) {
        hasher.update(chunk);
    }
    format!("{:x}", hasher.finalize())
}
