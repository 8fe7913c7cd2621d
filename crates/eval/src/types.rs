//! Engine error taxonomy and evaluation result types.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use eligo_core::ModelError;
use eligo_storage::StorageError;

/// Errors that prevent producing (or persisting) a trustworthy result.
///
/// Configuration and lookup problems propagate to the caller as errors,
/// never disguised as a `passed = false` result. Side-effect failures
/// after a valid result exists (callbacks, audit writes) are isolated
/// from the result unless the workflow policy says otherwise.
#[derive(Debug)]
pub enum EvalError {
    /// The criteria identifier resolved to nothing (neither id nor slug).
    UnknownCriteria { identifier: String },
    /// A rule references an operator name with no registration.
    UnknownOperator { name: String },
    /// A build-time model violation surfaced from stored data
    /// (malformed expected value, invalid pattern, bad scoring method).
    Model(ModelError),
    /// A synchronous workflow callback failed and the failure policy
    /// aborts the evaluation.
    Callback {
        stage: String,
        name: String,
        message: String,
    },
    /// A snapshot's stored checksum does not match its recomputed one.
    /// Indicates storage corruption; reported, never auto-corrected.
    Integrity { expected: String, actual: String },
    /// The storage collaborator failed.
    Storage(StorageError),
    /// The task queue rejected a queued callback.
    Queue { message: String },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UnknownCriteria { identifier } => {
                write!(f, "unknown criteria: {}", identifier)
            }
            EvalError::UnknownOperator { name } => {
                write!(f, "unknown operator: {} (not built in, not registered)", name)
            }
            EvalError::Model(err) => write!(f, "configuration error: {}", err),
            EvalError::Callback {
                stage,
                name,
                message,
            } => {
                write!(f, "callback '{}' failed at stage {}: {}", name, stage, message)
            }
            EvalError::Integrity { expected, actual } => {
                write!(
                    f,
                    "snapshot integrity violation: stored checksum {} but data hashes to {}",
                    expected, actual
                )
            }
            EvalError::Storage(err) => write!(f, "storage error: {}", err),
            EvalError::Queue { message } => write!(f, "task queue error: {}", message),
        }
    }
}

impl std::error::Error for EvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EvalError::Model(err) => Some(err),
            EvalError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelError> for EvalError {
    fn from(err: ModelError) -> Self {
        EvalError::Model(err)
    }
}

impl From<StorageError> for EvalError {
    fn from(err: StorageError) -> Self {
        EvalError::Storage(err)
    }
}

/// Outcome of one rule within an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub field: String,
    pub operator: String,
    pub passed: bool,
    /// The value found at the rule's field path (null when missing).
    pub actual: serde_json::Value,
    pub expected: serde_json::Value,
    pub weight: u32,
}

impl RuleOutcome {
    /// Compact human-readable condition, e.g. `income>=3000` or
    /// `age between [18,65]`.
    pub fn descriptor(&self) -> String {
        let symbolic = self
            .operator
            .chars()
            .next()
            .map(|c| !c.is_ascii_alphanumeric())
            .unwrap_or(false);
        let expected = compact_json(&self.expected);
        if symbolic {
            format!("{}{}{}", self.field, self.operator, expected)
        } else {
            format!("{} {} {}", self.field, self.operator, expected)
        }
    }
}

fn compact_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The structured result of evaluating one record against one criteria.
/// Immutable once produced; served as-is from cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub criteria_id: String,
    pub criteria_slug: String,
    pub passed: bool,
    /// 0..=100, two decimal places, banker's rounding.
    pub score: Decimal,
    /// Threshold the score was judged against.
    pub threshold: Decimal,
    /// Resolved decision label.
    pub decision: String,
    /// Per-rule outcomes in evaluation order.
    pub rule_outcomes: Vec<RuleOutcome>,
    /// Descriptors of the rules that failed, in evaluation order.
    pub failed_rules: Vec<String>,
    /// RFC 3339 timestamp of the computation that produced this result.
    pub evaluated_at: String,
    /// True when this result was served from the cache layer.
    pub from_cache: bool,
}

/// Current UTC time as an RFC 3339 string.
pub(crate) fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
