//! In-memory reference backend.
//!
//! Backs the engine's test suites and embedded deployments that do not
//! need durability. All reads return clones; the store itself is shared
//! behind an `RwLock` and is safe to use across async task boundaries.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::record::{AuditLogRecord, CriteriaRecord, RuleRecord, SnapshotRecord};
use crate::traits::EligibilityStore;

#[derive(Default)]
struct Inner {
    criteria: BTreeMap<String, CriteriaRecord>,
    /// rule id -> record; criteria ownership lives on the record.
    rules: BTreeMap<String, RuleRecord>,
    /// (checksum, subject_type, subject_id) -> record.
    snapshots: BTreeMap<(String, String, String), SnapshotRecord>,
    audit: Vec<AuditLogRecord>,
}

/// An `EligibilityStore` holding everything in process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of audit entries across all subjects.
    pub async fn audit_len(&self) -> usize {
        self.inner.read().await.audit.len()
    }

    /// Total number of stored snapshots.
    pub async fn snapshot_count(&self) -> usize {
        self.inner.read().await.snapshots.len()
    }
}

#[async_trait]
impl EligibilityStore for MemoryStore {
    async fn get_criteria(&self, identifier: &str) -> Result<CriteriaRecord, StorageError> {
        let inner = self.inner.read().await;
        if let Some(c) = inner.criteria.get(identifier) {
            return Ok(c.clone());
        }
        inner
            .criteria
            .values()
            .find(|c| c.slug == identifier)
            .cloned()
            .ok_or_else(|| StorageError::CriteriaNotFound {
                identifier: identifier.to_string(),
            })
    }

    async fn put_criteria(&self, record: CriteriaRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let slug_taken = inner
            .criteria
            .values()
            .any(|c| c.slug == record.slug && c.id != record.id);
        if slug_taken {
            return Err(StorageError::Duplicate {
                message: format!("slug '{}' already in use", record.slug),
            });
        }
        inner.criteria.insert(record.id.clone(), record);
        Ok(())
    }

    async fn touch_criteria(&self, criteria_id: &str, now: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let criteria =
            inner
                .criteria
                .get_mut(criteria_id)
                .ok_or_else(|| StorageError::CriteriaNotFound {
                    identifier: criteria_id.to_string(),
                })?;
        criteria.updated_at = now.to_string();
        Ok(())
    }

    async fn delete_criteria(&self, criteria_id: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        if inner.criteria.remove(criteria_id).is_none() {
            return Err(StorageError::CriteriaNotFound {
                identifier: criteria_id.to_string(),
            });
        }
        // Cascade: the criteria exclusively owns its rules.
        inner.rules.retain(|_, r| r.criteria_id != criteria_id);
        Ok(())
    }

    async fn get_rules_for(&self, criteria_id: &str) -> Result<Vec<RuleRecord>, StorageError> {
        let inner = self.inner.read().await;
        let mut rules: Vec<RuleRecord> = inner
            .rules
            .values()
            .filter(|r| r.criteria_id == criteria_id)
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        Ok(rules)
    }

    async fn put_rule(&self, record: RuleRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        inner.rules.insert(record.id.clone(), record);
        Ok(())
    }

    async fn delete_rule(&self, criteria_id: &str, rule_id: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        match inner.rules.get(rule_id) {
            Some(r) if r.criteria_id == criteria_id => {
                inner.rules.remove(rule_id);
                Ok(())
            }
            _ => Err(StorageError::RuleNotFound {
                criteria_id: criteria_id.to_string(),
                rule_id: rule_id.to_string(),
            }),
        }
    }

    async fn find_or_create_snapshot(
        &self,
        record: SnapshotRecord,
    ) -> Result<SnapshotRecord, StorageError> {
        let mut inner = self.inner.write().await;
        let key = (
            record.checksum.clone(),
            record.subject_type.clone(),
            record.subject_id.clone(),
        );
        if let Some(existing) = inner.snapshots.get(&key) {
            return Ok(existing.clone());
        }
        inner.snapshots.insert(key, record.clone());
        Ok(record)
    }

    async fn append_audit(&self, record: AuditLogRecord) -> Result<(), StorageError> {
        self.inner.write().await.audit.push(record);
        Ok(())
    }

    async fn list_audit(
        &self,
        subject_type: &str,
        subject_id: &str,
    ) -> Result<Vec<AuditLogRecord>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .audit
            .iter()
            .filter(|e| e.subject_type == subject_type && e.subject_id == subject_id)
            .cloned()
            .collect())
    }

    async fn purge_audit_before(&self, cutoff: &str) -> Result<usize, StorageError> {
        let mut inner = self.inner.write().await;
        let before = inner.audit.len();
        // RFC 3339 UTC strings order lexicographically.
        inner.audit.retain(|e| e.created_at.as_str() >= cutoff);
        Ok(before - inner.audit.len())
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
