//! Operator dispatch: built-in semantics plus the custom registry.
//!
//! Built-in operators are pure functions over `(actual, expected)`.
//! Custom operators are registered by name with a callback; evaluation
//! of a name with no registration is a configuration error, never a
//! silent false -- a rule that cannot run must not count as a failed
//! business condition.
//!
//! Data-shape mismatches at evaluation time (a non-numeric actual under
//! `>`, a list where a string was expected) fail the rule instead: that
//! is a property of the record being judged, not of the configuration.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use eligo_core::operator::OperatorKind;
use eligo_core::value::Value;

use crate::compile::CompiledRule;
use crate::numeric::{coerce_decimal, loose_eq, text_form};
use crate::types::EvalError;

/// Signature for caller-registered operators.
pub type CustomOperatorFn = dyn Fn(&Value, &Value) -> bool + Send + Sync;

/// Registry of custom operators, owned by the engine.
///
/// Registration is idempotent: re-registering a name overwrites the
/// previous callback. Explicit value with explicit teardown -- no
/// ambient global state.
#[derive(Default)]
pub struct OperatorRegistry {
    custom: RwLock<HashMap<String, Arc<CustomOperatorFn>>>,
}

impl OperatorRegistry {
    pub fn new() -> OperatorRegistry {
        OperatorRegistry::default()
    }

    /// Register (or overwrite) a custom operator.
    pub fn register<F>(&self, name: &str, callback: F)
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.custom
            .write()
            .expect("operator registry poisoned")
            .insert(name.to_string(), Arc::new(callback));
    }

    /// Remove a custom operator. Returns whether it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.custom
            .write()
            .expect("operator registry poisoned")
            .remove(name)
            .is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.custom
            .read()
            .expect("operator registry poisoned")
            .contains_key(name)
    }

    /// Evaluate one compiled rule against the actual value at its field.
    pub fn evaluate(&self, rule: &CompiledRule, actual: &Value) -> Result<bool, EvalError> {
        let expected = &rule.expected;
        match &rule.operator {
            OperatorKind::Equals => Ok(loose_eq(actual, expected)),
            OperatorKind::NotEquals => Ok(!loose_eq(actual, expected)),

            OperatorKind::GreaterThan => Ok(compare(actual, expected, |o| o.is_gt())),
            OperatorKind::GreaterThanOrEqual => Ok(compare(actual, expected, |o| o.is_ge())),
            OperatorKind::LessThan => Ok(compare(actual, expected, |o| o.is_lt())),
            OperatorKind::LessThanOrEqual => Ok(compare(actual, expected, |o| o.is_le())),

            OperatorKind::In => Ok(member_of(actual, expected)),
            OperatorKind::NotIn => Ok(match expected {
                Value::List(_) => !member_of(actual, expected),
                _ => false,
            }),

            OperatorKind::Between => Ok(in_range(rule, actual)),
            OperatorKind::NotBetween => Ok(match coerce_decimal(actual) {
                Some(_) => !in_range(rule, actual),
                None => false,
            }),

            OperatorKind::Contains => Ok(contains(actual, expected)),
            OperatorKind::StartsWith => Ok(affix(actual, expected, |a, b| a.starts_with(b))),
            OperatorKind::EndsWith => Ok(affix(actual, expected, |a, b| a.ends_with(b))),

            OperatorKind::Exists => Ok(!actual.is_absent()),
            OperatorKind::NotExists => Ok(actual.is_absent()),

            OperatorKind::Regex => {
                let re = rule.regex.as_ref().ok_or_else(|| {
                    EvalError::Model(eligo_core::ModelError::InvalidPattern {
                        pattern: rule.expected_json.to_string(),
                        message: "rule was not compiled".to_string(),
                    })
                })?;
                Ok(match text_form(actual) {
                    Some(text) => re.is_match(&text),
                    None => false,
                })
            }

            OperatorKind::Custom(name) => {
                let callback = self
                    .custom
                    .read()
                    .expect("operator registry poisoned")
                    .get(name)
                    .cloned();
                match callback {
                    Some(callback) => Ok(callback(actual, expected)),
                    None => Err(EvalError::UnknownOperator { name: name.clone() }),
                }
            }
        }
    }
}

fn compare(actual: &Value, expected: &Value, keep: fn(std::cmp::Ordering) -> bool) -> bool {
    match (coerce_decimal(actual), coerce_decimal(expected)) {
        (Some(a), Some(e)) => keep(a.cmp(&e)),
        _ => false,
    }
}

fn member_of(actual: &Value, expected: &Value) -> bool {
    match expected {
        Value::List(candidates) => candidates.iter().any(|c| loose_eq(actual, c)),
        _ => false,
    }
}

/// Inclusive at both bounds.
fn in_range(rule: &CompiledRule, actual: &Value) -> bool {
    match (rule.range, coerce_decimal(actual)) {
        (Some((min, max)), Some(a)) => a >= min && a <= max,
        _ => false,
    }
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::List(items) => items.iter().any(|item| loose_eq(item, expected)),
        Value::Text(haystack) => match text_form(expected) {
            Some(needle) => haystack.contains(&needle),
            None => false,
        },
        _ => false,
    }
}

fn affix(actual: &Value, expected: &Value, check: fn(&str, &str) -> bool) -> bool {
    match (text_form(actual), expected) {
        (Some(text), Value::Text(edge)) => check(&text, edge),
        _ => false,
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn rule(operator: &str, value: serde_json::Value) -> CompiledRule {
        let operator = OperatorKind::parse(operator);
        let regex = match (&operator, &value) {
            (OperatorKind::Regex, serde_json::Value::String(raw)) => {
                Some(eligo_core::compile_pattern(raw).unwrap())
            }
            _ => None,
        };
        let range = match (&operator, &value) {
            (OperatorKind::Between | OperatorKind::NotBetween, serde_json::Value::Array(items)) => {
                Some((
                    eligo_core::json_decimal(&items[0]).unwrap(),
                    eligo_core::json_decimal(&items[1]).unwrap(),
                ))
            }
            _ => None,
        };
        CompiledRule {
            id: "r1".to_string(),
            field: "f".to_string(),
            operator,
            expected: Value::from_json(&value),
            expected_json: value,
            weight: 1,
            order: 0,
            regex,
            range,
        }
    }

    fn eval(operator: &str, value: serde_json::Value, actual: &Value) -> bool {
        OperatorRegistry::new()
            .evaluate(&rule(operator, value), actual)
            .unwrap()
    }

    #[test]
    fn equals_is_loose_across_numeric_types() {
        assert!(eval("=", serde_json::json!(5), &Value::Text("5".to_string())));
        assert!(eval("=", serde_json::json!("5"), &Value::Int(5)));
        assert!(!eval("=", serde_json::json!(5), &Value::Int(6)));
        assert!(eval("!=", serde_json::json!(5), &Value::Int(6)));
    }

    #[test]
    fn ordering_comparisons_coerce_strings() {
        assert!(eval(">=", serde_json::json!(3000), &Value::Text("5000".to_string())));
        assert!(!eval(">=", serde_json::json!(3000), &Value::Int(2000)));
        assert!(!eval("<", serde_json::json!("10.5"), &Value::Decimal(Decimal::new(105, 1))));
        assert!(eval("<=", serde_json::json!("10.5"), &Value::Decimal(Decimal::new(105, 1))));
    }

    #[test]
    fn ordering_against_non_numeric_actual_fails_rule() {
        assert!(!eval(">", serde_json::json!(10), &Value::Text("abc".to_string())));
        assert!(!eval(">", serde_json::json!(10), &Value::Null));
    }

    #[test]
    fn membership() {
        let countries = serde_json::json!(["NO", "SE", "DK"]);
        assert!(eval("in", countries.clone(), &Value::Text("SE".to_string())));
        assert!(!eval("in", countries.clone(), &Value::Text("FI".to_string())));
        assert!(eval("not_in", countries.clone(), &Value::Text("FI".to_string())));
        assert!(!eval("not_in", countries, &Value::Text("SE".to_string())));
    }

    #[test]
    fn between_inclusive_at_both_bounds() {
        let range = serde_json::json!([18, 65]);
        assert!(!eval("between", range.clone(), &Value::Int(17)));
        assert!(eval("between", range.clone(), &Value::Int(18)));
        assert!(eval("between", range.clone(), &Value::Int(65)));
        assert!(!eval("between", range.clone(), &Value::Int(66)));
        assert!(eval("not_between", range.clone(), &Value::Int(66)));
        assert!(!eval("not_between", range.clone(), &Value::Int(65)));
        // Non-numeric actual fails both directions.
        assert!(!eval("between", range.clone(), &Value::Text("x".to_string())));
        assert!(!eval("not_between", range, &Value::Text("x".to_string())));
    }

    #[test]
    fn string_operators() {
        assert!(eval(
            "contains",
            serde_json::json!("oslo"),
            &Value::Text("greater oslo area".to_string())
        ));
        assert!(eval(
            "starts_with",
            serde_json::json!("NO-"),
            &Value::Text("NO-0150".to_string())
        ));
        assert!(eval(
            "ends_with",
            serde_json::json!("50"),
            &Value::Int(150)
        ));
        assert!(!eval(
            "starts_with",
            serde_json::json!("NO-"),
            &Value::List(vec![])
        ));
    }

    #[test]
    fn contains_on_lists_is_membership() {
        let actual = Value::from_json(&serde_json::json!(["a", "b"]));
        assert!(eval("contains", serde_json::json!("a"), &actual));
        assert!(!eval("contains", serde_json::json!("z"), &actual));
    }

    #[test]
    fn existence_treats_empty_as_absent() {
        assert!(eval("exists", serde_json::Value::Null, &Value::Int(0)));
        assert!(!eval("exists", serde_json::Value::Null, &Value::Null));
        assert!(!eval("exists", serde_json::Value::Null, &Value::Text(String::new())));
        assert!(eval("not_exists", serde_json::Value::Null, &Value::List(vec![])));
    }

    #[test]
    fn regex_matches_text_form() {
        assert!(eval(
            "regex",
            serde_json::json!("/^[A-Z]{2}-\\d+$/"),
            &Value::Text("NO-150".to_string())
        ));
        assert!(!eval(
            "regex",
            serde_json::json!("/^[A-Z]{2}-\\d+$/"),
            &Value::Text("no-150".to_string())
        ));
        assert!(eval(
            "regex",
            serde_json::json!("/^no/i"),
            &Value::Text("NO-150".to_string())
        ));
    }

    #[test]
    fn custom_operator_roundtrip() {
        let registry = OperatorRegistry::new();
        registry.register("divisible_by", |actual, expected| {
            match (coerce_decimal(actual), coerce_decimal(expected)) {
                (Some(a), Some(e)) if !e.is_zero() => (a % e).is_zero(),
                _ => false,
            }
        });

        let rule = rule("custom:divisible_by", serde_json::json!(3));
        assert!(registry.evaluate(&rule, &Value::Int(9)).unwrap());
        assert!(!registry.evaluate(&rule, &Value::Int(10)).unwrap());

        // Overwrite is idempotent.
        registry.register("divisible_by", |_, _| true);
        assert!(registry.evaluate(&rule, &Value::Int(10)).unwrap());

        assert!(registry.unregister("divisible_by"));
        assert!(!registry.unregister("divisible_by"));
    }

    #[test]
    fn unknown_operator_is_an_error_not_a_failed_rule() {
        let registry = OperatorRegistry::new();
        let err = registry
            .evaluate(&rule("foo_bar", serde_json::json!(1)), &Value::Int(1))
            .unwrap_err();
        assert!(matches!(err, EvalError::UnknownOperator { name } if name == "foo_bar"));
    }
}
