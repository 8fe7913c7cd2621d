use serde::{Deserialize, Serialize};

/// A criteria header row as stored in the backend.
///
/// The rule list is stored separately (`RuleRecord`) and fetched via
/// `get_rules_for`; this record carries only identity, classification,
/// and the freshness marker the cache layer keys on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriteriaRecord {
    pub id: String,
    pub name: String,
    /// Unique, URL-safe identifier. Secondary lookup key.
    pub slug: String,
    pub is_active: bool,
    /// Optional classification tags.
    pub kind: Option<String>,
    pub group: Option<String>,
    pub category: Option<String>,
    /// Free-form metadata (decision bands, thresholds, caller extras).
    pub metadata: serde_json::Value,
    /// Scoring method name (e.g. `"weighted"`).
    pub scoring_method: String,
    /// Passing threshold override; engine default applies when None.
    pub passing_threshold: Option<String>,
    /// ISO 8601 / RFC 3339 timestamp string. Freshness marker for cache keys.
    pub updated_at: String,
}

/// A rule row. Belongs to exactly one criteria; deleting the criteria
/// cascades to its rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRecord {
    pub id: String,
    pub criteria_id: String,
    /// Dotted path into the input record (e.g. `"applicant.income"`).
    pub field: String,
    /// Operator name (e.g. `">="`, `"between"`, `"custom:fraud_check"`).
    pub operator: String,
    /// Expected value; shape is operator-dependent.
    pub value: serde_json::Value,
    pub weight: u32,
    /// Evaluation/display order within the criteria.
    pub order: u32,
    pub is_active: bool,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub updated_at: String,
}

/// A content-addressed capture of an evaluated input record.
///
/// (checksum, subject_type, subject_id) is the dedup key: capturing
/// identical canonicalized data for the same subject returns the
/// existing row. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: String,
    /// SHA-256 hex of the canonicalized (key-sorted) payload.
    pub checksum: String,
    pub subject_type: String,
    pub subject_id: String,
    pub data: serde_json::Value,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub captured_at: String,
}

/// An append-only audit log entry for a lifecycle event.
///
/// Entries are never updated; the retention sweep is the only
/// permitted deletion path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogRecord {
    pub id: String,
    /// Event name (e.g. `"evaluation.completed"`, `"rule.deleted"`).
    pub event: String,
    pub subject_type: String,
    pub subject_id: String,
    /// State before the event, where applicable.
    pub old_state: Option<serde_json::Value>,
    /// State after the event, where applicable.
    pub new_state: Option<serde_json::Value>,
    /// Sanitized context payload. Sensitive fields are redacted by the
    /// recorder before this record is built.
    pub context: serde_json::Value,
    /// Actor reference (user id, service name), if known.
    pub actor: Option<String>,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
}
