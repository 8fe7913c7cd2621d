//! Content-addressed snapshots of evaluated input records.
//!
//! A snapshot captures exactly what the engine saw. The checksum is
//! computed over canonicalized JSON so that logically identical records
//! always map to the same checksum regardless of field order, which is
//! what makes (checksum, subject) deduplication sound.

use sha2::{Digest, Sha256};

use eligo_storage::{EligibilityStore, SnapshotRecord};

use crate::types::EvalError;

/// Canonical (key-sorted) compact JSON string.
///
/// `serde_json::Map` is backed by `BTreeMap` (the default when the
/// `preserve_order` feature is not enabled), so object keys serialize
/// in lexicographic order at every nesting depth -- insertion order of
/// the caller's record does not matter.
pub fn canonical_json(data: &serde_json::Value) -> String {
    serde_json::to_string(data).unwrap_or_else(|e| panic!("serialization error canonicalizing: {}", e))
}

/// SHA-256 hex checksum of the canonicalized data.
pub fn checksum(data: &serde_json::Value) -> String {
    let canonical = canonical_json(data);
    let hash = Sha256::digest(canonical.as_bytes());
    format!("{:x}", hash)
}

/// Capture a record for a subject, deduplicated on (checksum, subject).
///
/// Re-capturing identical data returns the existing snapshot row; the
/// stored `captured_at` is the first capture's.
pub async fn capture(
    store: &dyn EligibilityStore,
    subject_type: &str,
    subject_id: &str,
    data: &serde_json::Value,
    captured_at: String,
) -> Result<SnapshotRecord, EvalError> {
    let checksum = checksum(data);
    let record = SnapshotRecord {
        id: format!("{}-{}-{}", subject_type, subject_id, &checksum[..12]),
        checksum,
        subject_type: subject_type.to_string(),
        subject_id: subject_id.to_string(),
        data: data.clone(),
        captured_at,
    };
    Ok(store.find_or_create_snapshot(record).await?)
}

/// Recompute a snapshot's checksum and compare against the stored one.
///
/// A mismatch means the stored payload no longer hashes to its address:
/// storage corruption. Reported, never auto-corrected.
pub fn verify(snapshot: &SnapshotRecord) -> Result<(), EvalError> {
    let actual = checksum(&snapshot.data);
    if actual != snapshot.checksum {
        return Err(EvalError::Integrity {
            expected: snapshot.checksum.clone(),
            actual,
        });
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use eligo_storage::MemoryStore;

    #[test]
    fn checksum_ignores_key_order() {
        let a = serde_json::json!({"b": 1, "a": {"y": 2, "x": 3}});
        let b = serde_json::json!({"a": {"x": 3, "y": 2}, "b": 1});
        assert_eq!(checksum(&a), checksum(&b));
    }

    #[test]
    fn checksum_distinguishes_data() {
        let a = serde_json::json!({"income": 5000});
        let b = serde_json::json!({"income": 5001});
        assert_ne!(checksum(&a), checksum(&b));
    }

    #[tokio::test]
    async fn capture_dedups_per_subject() {
        let store = MemoryStore::new();
        let data = serde_json::json!({"income": 5000, "credit_score": 750});

        let first = capture(&store, "applicant", "42", &data, "2026-01-01T00:00:00Z".to_string())
            .await
            .unwrap();
        let second = capture(&store, "applicant", "42", &data, "2026-02-01T00:00:00Z".to_string())
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.captured_at, "2026-01-01T00:00:00Z");

        // Same data, different subject: a separate snapshot.
        let other = capture(&store, "applicant", "43", &data, "2026-01-01T00:00:00Z".to_string())
            .await
            .unwrap();
        assert_ne!(other.id, first.id);
        assert_eq!(store.snapshot_count().await, 2);
    }

    #[tokio::test]
    async fn verify_detects_tampering() {
        let store = MemoryStore::new();
        let data = serde_json::json!({"income": 5000});
        let mut snapshot = capture(&store, "applicant", "42", &data, "2026-01-01T00:00:00Z".to_string())
            .await
            .unwrap();
        assert!(verify(&snapshot).is_ok());

        snapshot.data = serde_json::json!({"income": 1});
        let err = verify(&snapshot).unwrap_err();
        assert!(matches!(err, EvalError::Integrity { .. }));
    }
}
