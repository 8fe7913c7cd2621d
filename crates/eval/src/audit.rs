//! Append-only audit recording with sensitive-field redaction.
//!
//! Every lifecycle event (criteria and rule mutations, completed
//! evaluations, callback executions) becomes one immutable log entry.
//! Context payloads are sanitized before they leave the engine: field
//! names that look sensitive are replaced with a redaction marker at any
//! nesting depth, unless the configuration explicitly permits them.
//! The retention sweep is the only deletion path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use eligo_storage::{AuditLogRecord, EligibilityStore};

use crate::config::AuditConfig;
use crate::types::{now_rfc3339, EvalError};

/// Lifecycle events the engine records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    CriteriaCreated,
    CriteriaUpdated,
    CriteriaActivated,
    CriteriaDeactivated,
    RuleCreated,
    RuleUpdated,
    RuleDeleted,
    EvaluationCompleted,
    CallbackExecuted,
}

impl AuditEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AuditEvent::CriteriaCreated => "criteria.created",
            AuditEvent::CriteriaUpdated => "criteria.updated",
            AuditEvent::CriteriaActivated => "criteria.activated",
            AuditEvent::CriteriaDeactivated => "criteria.deactivated",
            AuditEvent::RuleCreated => "rule.created",
            AuditEvent::RuleUpdated => "rule.updated",
            AuditEvent::RuleDeleted => "rule.deleted",
            AuditEvent::EvaluationCompleted => "evaluation.completed",
            AuditEvent::CallbackExecuted => "callback.executed",
        }
    }
}

const REDACTION_MARKER: &str = "[REDACTED]";

const SENSITIVE_MARKERS: [&str; 6] = [
    "password",
    "token",
    "secret",
    "apikey",
    "ssn",
    "creditcard",
];

fn is_sensitive(key: &str) -> bool {
    let normalized: String = key
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .collect::<String>()
        .to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|m| normalized.contains(m))
}

/// Replace sensitive fields with the redaction marker, recursively
/// through nested objects and arrays.
pub fn redact(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(fields) => serde_json::Value::Object(
            fields
                .iter()
                .map(|(key, val)| {
                    if is_sensitive(key) {
                        (key.clone(), serde_json::Value::String(REDACTION_MARKER.to_string()))
                    } else {
                        (key.clone(), redact(val))
                    }
                })
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(redact).collect())
        }
        other => other.clone(),
    }
}

/// Writes audit entries through the storage collaborator.
pub struct AuditRecorder {
    store: Arc<dyn EligibilityStore>,
    config: AuditConfig,
    seq: AtomicU64,
    epoch: i64,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn EligibilityStore>, config: AuditConfig) -> AuditRecorder {
        AuditRecorder {
            store,
            config,
            seq: AtomicU64::new(0),
            epoch: time::OffsetDateTime::now_utc().unix_timestamp(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Append one entry. A no-op when auditing is disabled.
    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        event: AuditEvent,
        subject_type: &str,
        subject_id: &str,
        old_state: Option<serde_json::Value>,
        new_state: Option<serde_json::Value>,
        context: serde_json::Value,
        actor: Option<&str>,
    ) -> Result<(), EvalError> {
        if !self.config.enabled {
            return Ok(());
        }
        let sanitize = |v: serde_json::Value| {
            if self.config.include_sensitive_data {
                v
            } else {
                redact(&v)
            }
        };
        let record = AuditLogRecord {
            id: format!(
                "audit-{}-{:06}",
                self.epoch,
                self.seq.fetch_add(1, Ordering::SeqCst)
            ),
            event: event.name().to_string(),
            subject_type: subject_type.to_string(),
            subject_id: subject_id.to_string(),
            old_state: old_state.map(sanitize),
            new_state: new_state.map(sanitize),
            context: sanitize(context),
            actor: actor.map(str::to_owned),
            created_at: now_rfc3339(),
        };
        self.store.append_audit(record).await?;
        Ok(())
    }

    /// Delete entries older than the configured retention horizon.
    /// Returns the number removed.
    pub async fn cleanup(&self) -> Result<usize, EvalError> {
        let cutoff = time::OffsetDateTime::now_utc()
            - time::Duration::days(i64::from(self.config.retention_days));
        let cutoff = cutoff
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string());
        Ok(self.store.purge_audit_before(&cutoff).await?)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
