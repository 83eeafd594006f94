// src/schedule/hash.rs

use blake3::Hasher;
use tracing::debug;

use crate::schedule::JobDefinition;

/// Compute a deterministic fingerprint of a definition set.
///
/// Order matters: the same jobs in a different document order produce a
/// different hash, because order breaks priority ties. The rendering is the
/// `Debug` form, which is stable within one build; hashes are never
/// persisted.
pub fn content_hash(defs: &[JobDefinition]) -> String {
    let mut hasher = Hasher::new();
    for def in defs {
        hasher.update(format!("{def:?}").as_bytes());
        hasher.update(b"\n");
    }
    let hash = hasher.finalize().to_hex().to_string();
    debug!(hash = %hash, jobs = defs.len(), "computed schedule content hash");
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::test_support::definition;

    #[test]
    fn identical_sets_hash_identically() {
        let a = vec![definition("x", &[]), definition("y", &["x"])];
        let b = vec![definition("x", &[]), definition("y", &["x"])];
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn any_field_change_changes_the_hash() {
        let a = vec![definition("x", &[])];
        let mut b = a.clone();
        b[0].priority = 1;
        assert_ne!(content_hash(&a), content_hash(&b));
    }
}
