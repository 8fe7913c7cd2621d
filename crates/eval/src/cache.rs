//! Evaluation-result caching: deterministic keys, TTL, tag eviction.
//!
//! The cache key folds in the criteria's freshness markers, so any
//! criteria or rule mutation produces natural misses without requiring
//! synchronous invalidation. Tag-scoped eviction is additionally
//! supported for backends with grouped eviction; backends without it
//! rely on key freshness plus TTL alone.
//!
//! Concurrent misses for one key may recompute concurrently; last write
//! wins, which is sound because the computed value for a given key is
//! deterministic.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::snapshot::canonical_json;
use crate::types::EvaluationResult;

/// Canonical fingerprint of an input record.
pub fn input_fingerprint(record: &serde_json::Value) -> String {
    let hash = Sha256::digest(canonical_json(record).as_bytes());
    format!("{:x}", hash)
}

/// Deterministic cache key over criteria identity, freshness markers,
/// and the input fingerprint.
pub fn evaluation_key(
    criteria_id: &str,
    criteria_updated_at: &str,
    ruleset_fingerprint: &str,
    input_fingerprint: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(criteria_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(criteria_updated_at.as_bytes());
    hasher.update(b"\n");
    hasher.update(ruleset_fingerprint.as_bytes());
    hasher.update(b"\n");
    hasher.update(input_fingerprint.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The cache contract the engine requires from a backend.
///
/// Writes for the same key are idempotent. `get` must never surface
/// backend failures -- a broken cache degrades to recomputation.
#[async_trait]
pub trait EvaluationCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<EvaluationResult>;

    /// Store a result under `key`, tagged with its criteria id.
    async fn put(&self, key: &str, tag: &str, result: EvaluationResult, ttl: Duration);

    /// Evict every entry carrying `tag`; returns the count evicted.
    /// Backends without grouped eviction may return 0 -- stale entries
    /// then age out via key freshness and TTL.
    async fn invalidate_tag(&self, tag: &str) -> usize;

    async fn flush(&self);
}

struct Entry {
    tag: String,
    expires_at: Instant,
    result: EvaluationResult,
}

/// In-memory TTL + tag cache, the reference backend.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> MemoryCache {
        MemoryCache::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EvaluationCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<EvaluationResult> {
        let mut entries = self.entries.lock().expect("cache poisoned");
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.result.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn put(&self, key: &str, tag: &str, result: EvaluationResult, ttl: Duration) {
        let mut entries = self.entries.lock().expect("cache poisoned");
        entries.insert(
            key.to_string(),
            Entry {
                tag: tag.to_string(),
                expires_at: Instant::now() + ttl,
                result,
            },
        );
    }

    async fn invalidate_tag(&self, tag: &str) -> usize {
        let mut entries = self.entries.lock().expect("cache poisoned");
        let before = entries.len();
        entries.retain(|_, entry| entry.tag != tag);
        before - entries.len()
    }

    async fn flush(&self) {
        self.entries.lock().expect("cache poisoned").clear();
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn result(criteria_id: &str) -> EvaluationResult {
        EvaluationResult {
            criteria_id: criteria_id.to_string(),
            criteria_slug: criteria_id.to_string(),
            passed: true,
            score: Decimal::from(100),
            threshold: Decimal::from(70),
            decision: "Approved".to_string(),
            rule_outcomes: vec![],
            failed_rules: vec![],
            evaluated_at: "2026-01-01T00:00:00Z".to_string(),
            from_cache: false,
        }
    }

    #[test]
    fn fingerprint_ignores_key_order() {
        let a = serde_json::json!({"income": 5000, "credit_score": 750});
        let b = serde_json::json!({"credit_score": 750, "income": 5000});
        assert_eq!(input_fingerprint(&a), input_fingerprint(&b));
        assert_ne!(
            input_fingerprint(&a),
            input_fingerprint(&serde_json::json!({"income": 5001, "credit_score": 750}))
        );
    }

    #[test]
    fn key_changes_with_any_freshness_marker() {
        let base = evaluation_key("c1", "t1", "2:t1", "fp");
        assert_ne!(base, evaluation_key("c1", "t2", "2:t1", "fp"));
        assert_ne!(base, evaluation_key("c1", "t1", "3:t2", "fp"));
        assert_ne!(base, evaluation_key("c1", "t1", "2:t1", "fp2"));
        assert_eq!(base, evaluation_key("c1", "t1", "2:t1", "fp"));
    }

    #[tokio::test]
    async fn round_trip_and_expiry() {
        let cache = MemoryCache::new();
        cache
            .put("k1", "c1", result("c1"), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("k1").await.unwrap().criteria_id, "c1");

        cache.put("k2", "c1", result("c1"), Duration::ZERO).await;
        assert!(cache.get("k2").await.is_none());
    }

    #[tokio::test]
    async fn tag_eviction_is_scoped() {
        let cache = MemoryCache::new();
        cache
            .put("k1", "c1", result("c1"), Duration::from_secs(60))
            .await;
        cache
            .put("k2", "c1", result("c1"), Duration::from_secs(60))
            .await;
        cache
            .put("k3", "c2", result("c2"), Duration::from_secs(60))
            .await;

        assert_eq!(cache.invalidate_tag("c1").await, 2);
        assert!(cache.get("k1").await.is_none());
        assert!(cache.get("k3").await.is_some());

        cache.flush().await;
        assert!(cache.is_empty());
    }
}
