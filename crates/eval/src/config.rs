//! Engine configuration.
//!
//! One explicit struct passed into the engine at construction. No
//! ambient lookups inside evaluation logic: every knob is read from
//! here, once, by the component that owns it.

use std::collections::BTreeMap;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub evaluation: EvaluationConfig,
    pub performance: PerformanceConfig,
    pub audit: AuditConfig,
    pub workflow: WorkflowConfig,
    /// Priority name -> default weight, for rules without an explicit one.
    pub rule_weights: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub cache_enabled: bool,
    /// Evaluation-result TTL, seconds.
    pub cache_ttl: u64,
    /// Applied when a criteria carries no threshold of its own.
    pub default_passing_threshold: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Keep compiled rule sets across evaluations.
    pub compile_rules: bool,
    /// Compiled-rule-set TTL, seconds. Independent of the result TTL.
    pub compilation_cache_ttl: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    /// When false (the default), sensitive fields in audit context are
    /// replaced with a redaction marker.
    pub include_sensitive_data: bool,
    pub snapshots_enabled: bool,
    pub retention_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// When true, a failing synchronous callback aborts the remaining
    /// stages and surfaces to the caller as an evaluation error.
    pub fail_on_callback_error: bool,
    pub log_callback_errors: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            evaluation: EvaluationConfig::default(),
            performance: PerformanceConfig::default(),
            audit: AuditConfig::default(),
            workflow: WorkflowConfig::default(),
            rule_weights: default_rule_weights(),
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            cache_enabled: true,
            cache_ttl: 3600,
            default_passing_threshold: 100,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig {
            compile_rules: true,
            compilation_cache_ttl: 86_400,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        AuditConfig {
            enabled: true,
            include_sensitive_data: false,
            snapshots_enabled: true,
            retention_days: 180,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        WorkflowConfig {
            fail_on_callback_error: false,
            log_callback_errors: true,
        }
    }
}

fn default_rule_weights() -> BTreeMap<String, u32> {
    BTreeMap::from([
        ("low".to_string(), 10),
        ("normal".to_string(), 25),
        ("high".to_string(), 50),
        ("critical".to_string(), 100),
    ])
}

impl EngineConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.evaluation.cache_ttl)
    }

    pub fn compilation_ttl(&self) -> Duration {
        Duration::from_secs(self.performance.compilation_cache_ttl)
    }

    pub fn default_threshold(&self) -> Decimal {
        Decimal::from(self.evaluation.default_passing_threshold)
    }

    /// Resolve a rule's weight: explicit wins, then its named priority,
    /// then the `normal` table entry, then 25.
    pub fn resolve_weight(&self, explicit: Option<u32>, priority: Option<&str>) -> u32 {
        if let Some(weight) = explicit {
            return weight;
        }
        if let Some(priority) = priority {
            if let Some(weight) = self.rule_weights.get(priority) {
                return *weight;
            }
        }
        self.rule_weights.get("normal").copied().unwrap_or(25)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
