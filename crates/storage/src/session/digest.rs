#![forbid(unsafe_code)]

use parking_lot::Mutex;
use sha2::Digest as _;

/// One SHA-256 instance shared by every worker. Update and finalize happen
/// under the same lock so concurrent callers never interleave.
pub struct RevisionDigest {
    hasher: Mutex<sha2::Sha256>,
}

impl RevisionDigest {
    pub fn new() -> Self {
        Self {
            hasher: Mutex::new(sha2::Sha256::new()),
        }
    }

    pub fn compute(&self, content: &[u8]) -> Vec<u8> {
        let mut hasher = self.hasher.lock();
        hasher.update(content);
        hasher.finalize_reset().to_vec()
    }
}

impl Default for RevisionDigest {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RevisionDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RevisionDigest(sha256)")
    }
}
