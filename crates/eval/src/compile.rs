//! Rule compilation: stored rows into an executable form.
//!
//! Compilation parses everything once -- operator names, expected values,
//! regex patterns, range bounds -- so that the hot evaluation path never
//! re-parses and malformed stored data surfaces as a configuration error
//! up front instead of a silent false mid-evaluation. Compiled sets are
//! cached per criteria, keyed by the freshness markers, decoupled from
//! any specific input record.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rust_decimal::Decimal;

use eligo_core::criteria::{DecisionBand, ScoringMethod};
use eligo_core::operator::{compile_pattern, OperatorKind};
use eligo_core::value::{json_decimal, parse_decimal_literal, Value};
use eligo_core::ModelError;
use eligo_storage::{CriteriaRecord, RuleRecord};

use crate::types::EvalError;

/// One rule in executable form. Everything operator evaluation needs is
/// pre-parsed here.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: String,
    pub field: String,
    pub operator: OperatorKind,
    pub expected: Value,
    /// Original JSON expected value, echoed into rule outcomes.
    pub expected_json: serde_json::Value,
    pub weight: u32,
    pub order: u32,
    /// Pre-compiled pattern for `Regex` rules.
    pub regex: Option<regex::Regex>,
    /// Parsed inclusive bounds for `Between`/`NotBetween` rules.
    pub range: Option<(Decimal, Decimal)>,
}

/// A criteria in executable form: active rules only, ordered, with the
/// scoring method, threshold and decision bands resolved.
#[derive(Debug, Clone)]
pub struct CompiledCriteria {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub scoring_method: ScoringMethod,
    pub threshold: Decimal,
    pub decision_bands: Vec<DecisionBand>,
    pub rules: Vec<CompiledRule>,
    /// Criteria freshness marker at compile time.
    pub criteria_updated_at: String,
    /// Rule-set freshness marker at compile time.
    pub ruleset_fingerprint: String,
}

impl CompiledCriteria {
    /// Combined freshness marker: any criteria or rule mutation changes it.
    pub fn version(&self) -> String {
        format!("{}|{}", self.criteria_updated_at, self.ruleset_fingerprint)
    }
}

/// Rule-set freshness marker: count plus the newest `updated_at` across
/// ALL rules (inactive included, so deactivating a rule is a mutation).
pub fn ruleset_fingerprint(rules: &[RuleRecord]) -> String {
    let max_updated = rules
        .iter()
        .map(|r| r.updated_at.as_str())
        .max()
        .unwrap_or("");
    format!("{}:{}", rules.len(), max_updated)
}

/// Compile a criteria row and its rule rows into executable form.
pub fn compile(
    criteria: &CriteriaRecord,
    rules: &[RuleRecord],
    default_threshold: Decimal,
) -> Result<CompiledCriteria, EvalError> {
    let scoring_method = ScoringMethod::parse(&criteria.scoring_method)?;

    let threshold = match &criteria.passing_threshold {
        Some(raw) => parse_decimal_literal(raw).ok_or_else(|| {
            EvalError::Model(ModelError::InvalidThreshold { value: raw.clone() })
        })?,
        None => default_threshold,
    };

    let decision_bands = match criteria.metadata.get("decision_bands") {
        Some(raw) => serde_json::from_value::<Vec<DecisionBand>>(raw.clone()).map_err(|e| {
            EvalError::Model(ModelError::InvalidMetadata {
                message: format!("decision_bands: {}", e),
            })
        })?,
        None => Vec::new(),
    };

    let fingerprint = ruleset_fingerprint(rules);
    let mut compiled_rules = Vec::new();
    for rule in rules.iter().filter(|r| r.is_active) {
        compiled_rules.push(compile_rule(rule)?);
    }

    Ok(CompiledCriteria {
        id: criteria.id.clone(),
        slug: criteria.slug.clone(),
        name: criteria.name.clone(),
        scoring_method,
        threshold,
        decision_bands,
        rules: compiled_rules,
        criteria_updated_at: criteria.updated_at.clone(),
        ruleset_fingerprint: fingerprint,
    })
}

fn compile_rule(rule: &RuleRecord) -> Result<CompiledRule, EvalError> {
    let operator = OperatorKind::parse(&rule.operator);
    // Rules written through the builder were validated already; rows
    // written directly to storage get the same check here.
    operator.validate_shape(&rule.value)?;

    let regex = match (&operator, &rule.value) {
        (OperatorKind::Regex, serde_json::Value::String(raw)) => Some(compile_pattern(raw)?),
        _ => None,
    };

    let range = match (&operator, &rule.value) {
        (OperatorKind::Between | OperatorKind::NotBetween, serde_json::Value::Array(items)) => {
            // Shape validation guarantees two numeric-coercible elements.
            match (json_decimal(&items[0]), json_decimal(&items[1])) {
                (Some(min), Some(max)) => Some((min, max)),
                _ => None,
            }
        }
        _ => None,
    };

    Ok(CompiledRule {
        id: rule.id.clone(),
        field: rule.field.clone(),
        operator,
        expected: Value::from_json(&rule.value),
        expected_json: rule.value.clone(),
        weight: rule.weight,
        order: rule.order,
        regex,
        range,
    })
}

// ──────────────────────────────────────────────
// Compilation cache
// ──────────────────────────────────────────────

struct CacheEntry {
    version: String,
    compiled_at: Instant,
    compiled: Arc<CompiledCriteria>,
}

/// Process-local cache of compiled rule sets.
///
/// Keyed by criteria id; an entry is served only while its version
/// (criteria + rule-set freshness markers) still matches and its TTL has
/// not elapsed. Holds compiled regexes, so this cache never leaves the
/// process -- it is independent of the evaluation-result cache backend.
pub struct CompilationCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl CompilationCache {
    pub fn new(ttl: Duration) -> CompilationCache {
        CompilationCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, criteria_id: &str, version: &str) -> Option<Arc<CompiledCriteria>> {
        let mut entries = self.entries.lock().expect("compilation cache poisoned");
        match entries.get(criteria_id) {
            Some(entry) if entry.version == version && entry.compiled_at.elapsed() < self.ttl => {
                Some(Arc::clone(&entry.compiled))
            }
            Some(_) => {
                entries.remove(criteria_id);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, compiled: Arc<CompiledCriteria>) {
        let mut entries = self.entries.lock().expect("compilation cache poisoned");
        entries.insert(
            compiled.id.clone(),
            CacheEntry {
                version: compiled.version(),
                compiled_at: Instant::now(),
                compiled,
            },
        );
    }

    pub fn invalidate(&self, criteria_id: &str) {
        self.entries
            .lock()
            .expect("compilation cache poisoned")
            .remove(criteria_id);
    }

    pub fn flush(&self) {
        self.entries
            .lock()
            .expect("compilation cache poisoned")
            .clear();
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
