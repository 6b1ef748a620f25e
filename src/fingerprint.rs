//! Content fingerprints for chunk identity
//!
//! A fingerprint carries two pieces of identity: a point id that is stable for
//! a (root, path, sequence index) slot, so re-embedding changed content
//! overwrites the prior vector; and a content hash that is compared against the
//! stored payload to decide whether the slot needs re-embedding at all. The
//! vector store is the only source of truth for that comparison - there is no
//! side cache to drift out of sync across restarts.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Bumped when the stored payload layout changes; a stored point with a
/// different version is re-embedded regardless of its content hash.
pub const PAYLOAD_SCHEMA_VERSION: u64 = 1;

/// Stable identity for one chunk slot and its current content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Vector store point id, stable per (root, path, sequence index)
    pub point_id: String,
    /// Hex sha256 of the chunk text
    pub content_hash: String,
}

impl Fingerprint {
    /// Compute the fingerprint for a chunk slot.
    pub fn new(root_id: &str, relative_path: &str, sequence: usize, text: &str) -> Self {
        Self {
            point_id: point_id(root_id, relative_path, sequence),
            content_hash: content_hash(text),
        }
    }

    /// Decide whether this slot must be re-embedded given what the store holds.
    ///
    /// Returns true when the point is absent, the stored hash differs, or the
    /// stored schema version differs from the current one.
    pub fn has_changed(&self, stored: Option<&StoredIdentity>) -> bool {
        match stored {
            None => true,
            Some(identity) => {
                identity.content_hash != self.content_hash
                    || identity.schema_version != PAYLOAD_SCHEMA_VERSION
            }
        }
    }
}

/// The identity fields read back from a stored point's payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredIdentity {
    pub content_hash: String,
    pub schema_version: u64,
}

/// Hex sha256 of chunk text
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Deterministic UUID point id for a chunk slot.
///
/// Qdrant point ids must be UUIDs or integers; the first 16 bytes of a sha256
/// over the slot coordinates give a stable, collision-resistant id.
pub fn point_id(root_id: &str, relative_path: &str, sequence: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(root_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(relative_path.as_bytes());
    hasher.update([0u8]);
    hasher.update(sequence.to_le_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_is_deterministic() {
        let a = point_id("/repo", "src/main.rs", 0);
        let b = point_id("/repo", "src/main.rs", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_point_id_varies_by_slot() {
        let base = point_id("/repo", "src/main.rs", 0);
        assert_ne!(base, point_id("/repo", "src/main.rs", 1));
        assert_ne!(base, point_id("/repo", "src/lib.rs", 0));
        assert_ne!(base, point_id("/other", "src/main.rs", 0));
    }

    #[test]
    fn test_point_id_stable_across_content_changes() {
        // Changed content keeps its slot id so an upsert overwrites the old vector
        let before = Fingerprint::new("/repo", "a.rs", 2, "old text");
        let after = Fingerprint::new("/repo", "a.rs", 2, "new text");
        assert_eq!(before.point_id, after.point_id);
        assert_ne!(before.content_hash, after.content_hash);
    }

    #[test]
    fn test_point_id_is_valid_uuid() {
        let id = point_id("/repo", "src/main.rs", 7);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_has_changed_on_absent_point() {
        let fp = Fingerprint::new("/repo", "a.rs", 0, "text");
        assert!(fp.has_changed(None));
    }

    #[test]
    fn test_has_changed_on_identical_content() {
        let fp = Fingerprint::new("/repo", "a.rs", 0, "text");
        let stored = StoredIdentity {
            content_hash: fp.content_hash.clone(),
            schema_version: PAYLOAD_SCHEMA_VERSION,
        };
        assert!(!fp.has_changed(Some(&stored)));
    }

    #[test]
    fn test_has_changed_on_hash_drift() {
        let fp = Fingerprint::new("/repo", "a.rs", 0, "text");
        let stored = StoredIdentity {
            content_hash: content_hash("different"),
            schema_version: PAYLOAD_SCHEMA_VERSION,
        };
        assert!(fp.has_changed(Some(&stored)));
    }

    #[test]
    fn test_has_changed_on_schema_version_drift() {
        let fp = Fingerprint::new("/repo", "a.rs", 0, "text");
        let stored = StoredIdentity {
            content_hash: fp.content_hash.clone(),
            schema_version: PAYLOAD_SCHEMA_VERSION + 1,
        };
        assert!(fp.has_changed(Some(&stored)));
    }
}
