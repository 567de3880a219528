use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Hex-encoded SHA-256 of a binary's bytes.
pub fn fingerprint_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Fingerprint of a binary on disk.
pub fn fingerprint_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let data = fs::read(path.as_ref())?;
    Ok(fingerprint_bytes(&data))
}
