//! The evaluator: compiled criteria + input record -> result.
//!
//! A pure computation apart from the operator registry lookup: field
//! values are read from the record, each active rule runs through the
//! registry, outcomes fold into a score, and the decision label resolves
//! from the criteria's bands. Deterministic for a given (rule set, input)
//! pair -- which is what makes the cache layer sound.

use eligo_core::value::{lookup_path, Value};

use crate::compile::CompiledCriteria;
use crate::operator::OperatorRegistry;
use crate::scoring;
use crate::types::{EvalError, EvaluationResult, RuleOutcome};

/// Default decision labels when a criteria defines no bands.
const LABEL_PASSED: &str = "Approved";
const LABEL_FAILED: &str = "Rejected";

/// Evaluate one input record against a compiled criteria.
///
/// `evaluated_at` is injected by the caller so that batch evaluations
/// and tests control the clock.
pub fn evaluate_compiled(
    compiled: &CompiledCriteria,
    record: &serde_json::Value,
    registry: &OperatorRegistry,
    evaluated_at: String,
) -> Result<EvaluationResult, EvalError> {
    let mut outcomes = Vec::with_capacity(compiled.rules.len());
    for rule in &compiled.rules {
        let actual_json = lookup_path(record, &rule.field)
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let actual = Value::from_json(&actual_json);
        let passed = registry.evaluate(rule, &actual)?;

        tracing::debug!(
            criteria = %compiled.id,
            rule = %rule.id,
            field = %rule.field,
            operator = %rule.operator,
            passed,
            "rule evaluated"
        );

        outcomes.push(RuleOutcome {
            rule_id: rule.id.clone(),
            field: rule.field.clone(),
            operator: rule.operator.name(),
            passed,
            actual: actual_json,
            expected: rule.expected_json.clone(),
            weight: rule.weight,
        });
    }

    let score = scoring::score(compiled.scoring_method, &outcomes);
    let passed = score >= compiled.threshold;

    let decision = compiled
        .decision_bands
        .iter()
        .filter(|band| band.contains(score))
        .max_by(|a, b| a.min.cmp(&b.min))
        .map(|band| band.label.clone())
        .unwrap_or_else(|| {
            if passed {
                LABEL_PASSED.to_string()
            } else {
                LABEL_FAILED.to_string()
            }
        });

    let failed_rules = outcomes
        .iter()
        .filter(|o| !o.passed)
        .map(RuleOutcome::descriptor)
        .collect();

    Ok(EvaluationResult {
        criteria_id: compiled.id.clone(),
        criteria_slug: compiled.slug.clone(),
        passed,
        score,
        threshold: compiled.threshold,
        decision,
        rule_outcomes: outcomes,
        failed_rules,
        evaluated_at,
        from_cache: false,
    })
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use eligo_storage::{CriteriaRecord, RuleRecord};
    use rust_decimal::Decimal;

    fn criteria_record(scoring: &str, threshold: &str) -> CriteriaRecord {
        CriteriaRecord {
            id: "loan".to_string(),
            name: "Loan Approval".to_string(),
            slug: "loan-approval".to_string(),
            is_active: true,
            kind: None,
            group: None,
            category: None,
            metadata: serde_json::json!({}),
            scoring_method: scoring.to_string(),
            passing_threshold: Some(threshold.to_string()),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn rule(id: &str, field: &str, operator: &str, value: serde_json::Value, weight: u32) -> RuleRecord {
        RuleRecord {
            id: id.to_string(),
            criteria_id: "loan".to_string(),
            field: field.to_string(),
            operator: operator.to_string(),
            value,
            weight,
            order: 0,
            is_active: true,
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn loan_criteria() -> CompiledCriteria {
        compile(
            &criteria_record("weighted", "70"),
            &[
                rule("r-income", "income", ">=", serde_json::json!(3000), 40),
                rule("r-credit", "credit_score", ">=", serde_json::json!(650), 60),
            ],
            Decimal::from(100),
        )
        .unwrap()
    }

    fn eval(
        compiled: &CompiledCriteria,
        record: serde_json::Value,
    ) -> EvaluationResult {
        evaluate_compiled(
            compiled,
            &record,
            &OperatorRegistry::new(),
            "2026-01-01T00:00:00Z".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn loan_approval_passes_on_full_score() {
        let result = eval(
            &loan_criteria(),
            serde_json::json!({"income": 5000, "credit_score": 750}),
        );
        assert!(result.passed);
        assert_eq!(result.score, Decimal::from(100));
        assert_eq!(result.decision, "Approved");
        assert!(result.failed_rules.is_empty());
    }

    #[test]
    fn loan_approval_fails_below_threshold() {
        let result = eval(
            &loan_criteria(),
            serde_json::json!({"income": 2000, "credit_score": 750}),
        );
        assert!(!result.passed);
        assert_eq!(result.score, Decimal::from(60));
        assert_eq!(result.decision, "Rejected");
        assert_eq!(result.failed_rules, vec!["income>=3000".to_string()]);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let compiled = loan_criteria();
        let record = serde_json::json!({"income": 2000, "credit_score": 750});
        let a = eval(&compiled, record.clone());
        let b = eval(&compiled, record);
        assert_eq!(a, b);
    }

    #[test]
    fn missing_field_fails_rule_not_evaluation() {
        let result = eval(&loan_criteria(), serde_json::json!({"income": 5000}));
        assert!(!result.passed);
        assert_eq!(result.score, Decimal::from(40));
        assert_eq!(result.rule_outcomes[1].actual, serde_json::Value::Null);
    }

    #[test]
    fn decision_bands_resolve_highest_band_first() {
        let mut criteria = criteria_record("percentage", "50");
        criteria.metadata = serde_json::json!({
            "decision_bands": [
                {"min": "0", "max": "100", "label": "Pending"},
                {"min": "50", "max": "100", "label": "Approved"},
                {"min": "90", "max": "100", "label": "Fast-Track"}
            ]
        });
        let compiled = compile(
            &criteria,
            &[
                rule("r1", "a", "exists", serde_json::Value::Null, 1),
                rule("r2", "b", "exists", serde_json::Value::Null, 1),
            ],
            Decimal::from(100),
        )
        .unwrap();

        let full = eval(&compiled, serde_json::json!({"a": 1, "b": 2}));
        assert_eq!(full.decision, "Fast-Track");

        let half = eval(&compiled, serde_json::json!({"a": 1}));
        assert_eq!(half.decision, "Approved");

        let none = eval(&compiled, serde_json::json!({}));
        assert_eq!(none.decision, "Pending");
        assert!(!none.passed);
    }

    #[test]
    fn empty_criteria_is_a_vacuous_pass() {
        let compiled = compile(
            &criteria_record("weighted", "70"),
            &[],
            Decimal::from(100),
        )
        .unwrap();
        let result = eval(&compiled, serde_json::json!({"anything": true}));
        assert!(result.passed);
        assert_eq!(result.score, Decimal::from(100));
    }

    #[test]
    fn unknown_operator_surfaces_as_configuration_error() {
        let compiled = compile(
            &criteria_record("weighted", "70"),
            &[rule("r1", "income", "foo_bar", serde_json::json!(1), 10)],
            Decimal::from(100),
        )
        .unwrap();
        let err = evaluate_compiled(
            &compiled,
            &serde_json::json!({"income": 1}),
            &OperatorRegistry::new(),
            "2026-01-01T00:00:00Z".to_string(),
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::UnknownOperator { name } if name == "foo_bar"));
    }
}
