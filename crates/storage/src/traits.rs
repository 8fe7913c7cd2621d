use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{AuditLogRecord, CriteriaRecord, RuleRecord, SnapshotRecord};

/// The storage trait for eligo persistence backends.
///
/// An `EligibilityStore` implementation provides durable storage for
/// criteria headers, their rules, input snapshots, and audit log entries.
/// The engine treats it as a collaborator: every evaluation is a read of
/// criteria + rules followed by pure computation, so the store only needs
/// to provide consistent reads — no transaction surface is required here.
///
/// ## Freshness Markers
///
/// `touch_criteria` must bump the criteria's `updated_at`; the cache layer
/// folds that timestamp (and the rule set's count + max `updated_at`) into
/// its keys, so stale entries become unreachable after any mutation
/// without requiring synchronous eviction.
///
/// ## Snapshot Dedup
///
/// `find_or_create_snapshot` enforces the (checksum, subject) dedup
/// invariant: if a row with the same checksum and subject reference
/// already exists it is returned unchanged, otherwise the given record
/// is inserted.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be shared across
/// async task boundaries.
#[async_trait]
pub trait EligibilityStore: Send + Sync + 'static {
    // ── Criteria ─────────────────────────────────────────────────────────────

    /// Fetch a criteria by id, falling back to slug lookup.
    ///
    /// Returns `Err(StorageError::CriteriaNotFound)` if neither matches.
    async fn get_criteria(&self, identifier: &str) -> Result<CriteriaRecord, StorageError>;

    /// Insert or replace a criteria header.
    ///
    /// Returns `Err(StorageError::Duplicate)` if another criteria (different
    /// id) already owns the slug.
    async fn put_criteria(&self, record: CriteriaRecord) -> Result<(), StorageError>;

    /// Bump the criteria's `updated_at` freshness marker.
    async fn touch_criteria(&self, criteria_id: &str, now: &str) -> Result<(), StorageError>;

    /// Delete a criteria and cascade to its rules.
    async fn delete_criteria(&self, criteria_id: &str) -> Result<(), StorageError>;

    // ── Rules ────────────────────────────────────────────────────────────────

    /// Fetch all rules for a criteria, ordered by `order` then id.
    ///
    /// Inactive rules are included; the evaluator filters on `is_active`
    /// so that rule-set fingerprints see deactivation as a mutation.
    async fn get_rules_for(&self, criteria_id: &str) -> Result<Vec<RuleRecord>, StorageError>;

    /// Insert or replace a rule.
    async fn put_rule(&self, record: RuleRecord) -> Result<(), StorageError>;

    /// Delete a rule.
    ///
    /// Returns `Err(StorageError::RuleNotFound)` if absent.
    async fn delete_rule(&self, criteria_id: &str, rule_id: &str) -> Result<(), StorageError>;

    // ── Snapshots ────────────────────────────────────────────────────────────

    /// Return the existing snapshot for (checksum, subject) or insert the
    /// given record. The returned record is the canonical row either way.
    async fn find_or_create_snapshot(
        &self,
        record: SnapshotRecord,
    ) -> Result<SnapshotRecord, StorageError>;

    // ── Audit log ────────────────────────────────────────────────────────────

    /// Append an audit log entry. Entries are immutable once written.
    async fn append_audit(&self, record: AuditLogRecord) -> Result<(), StorageError>;

    /// List audit entries for a subject, oldest first.
    async fn list_audit(
        &self,
        subject_type: &str,
        subject_id: &str,
    ) -> Result<Vec<AuditLogRecord>, StorageError>;

    /// Delete audit entries with `created_at` strictly before the cutoff
    /// (RFC 3339). Returns the number of entries removed. This is the only
    /// permitted deletion path for audit entries.
    async fn purge_audit_before(&self, cutoff: &str) -> Result<usize, StorageError>;
}
