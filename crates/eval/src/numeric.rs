//! Numeric coercion and loose comparison over typed values.
//!
//! All arithmetic uses `rust_decimal::Decimal` with
//! `RoundingStrategy::MidpointNearestEven`. No `f64` anywhere in the
//! evaluation path. Numeric-looking strings coerce to decimals so that
//! `"3000"` compares equal to `3000` -- input records arrive from form
//! posts and CSV imports as often as from typed APIs.

use rust_decimal::{Decimal, RoundingStrategy};

use eligo_core::value::{parse_decimal_literal, Value};

/// Coerce a value to a decimal: integers and decimals directly,
/// numeric-looking text by parsing. Everything else is not numeric.
pub fn coerce_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Int(i) => Some(Decimal::from(*i)),
        Value::Decimal(d) => Some(*d),
        Value::Text(s) => parse_decimal_literal(s.trim()),
        _ => None,
    }
}

/// Loose equality: numeric values compare by magnitude across Int,
/// Decimal, and numeric text; lists element-wise; records key-wise;
/// everything else exactly.
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    if let (Some(l), Some(r)) = (coerce_decimal(left), coerce_decimal(right)) {
        return l == r;
    }
    match (left, right) {
        (Value::List(l), Value::List(r)) => {
            l.len() == r.len() && l.iter().zip(r.iter()).all(|(a, b)| loose_eq(a, b))
        }
        (Value::Record(l), Value::Record(r)) => {
            l.len() == r.len()
                && l.iter()
                    .zip(r.iter())
                    .all(|((lk, lv), (rk, rv))| lk == rk && loose_eq(lv, rv))
        }
        _ => left == right,
    }
}

/// Render a scalar as text for substring/prefix/suffix/pattern matching.
/// Containers and null have no text form.
pub fn text_form(value: &Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        Value::Decimal(d) => Some(d.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Round a score to two decimal places, banker's rounding. The result
/// is normalized so equal scores always render identically.
pub fn round_score(score: Decimal) -> Decimal {
    score
        .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
        .normalize()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_numeric_string() {
        assert_eq!(
            coerce_decimal(&Value::Text("3000".to_string())),
            Some(Decimal::from(3000))
        );
        assert_eq!(
            coerce_decimal(&Value::Text(" 12.5 ".to_string())),
            Some(Decimal::new(125, 1))
        );
        assert_eq!(coerce_decimal(&Value::Text("abc".to_string())), None);
        assert_eq!(coerce_decimal(&Value::Bool(true)), None);
    }

    #[test]
    fn loose_eq_across_numeric_types() {
        assert!(loose_eq(&Value::Int(5), &Value::Decimal(Decimal::new(50, 1))));
        assert!(loose_eq(&Value::Int(5), &Value::Text("5".to_string())));
        assert!(!loose_eq(&Value::Int(5), &Value::Text("5.1".to_string())));
    }

    #[test]
    fn loose_eq_structural() {
        let a = Value::List(vec![Value::Int(1), Value::Text("2".to_string())]);
        let b = Value::List(vec![Value::Text("1".to_string()), Value::Int(2)]);
        assert!(loose_eq(&a, &b));
        let c = Value::List(vec![Value::Int(1)]);
        assert!(!loose_eq(&a, &c));
    }

    #[test]
    fn loose_eq_exact_fallback() {
        assert!(loose_eq(
            &Value::Text("yes".to_string()),
            &Value::Text("yes".to_string())
        ));
        assert!(!loose_eq(&Value::Text("yes".to_string()), &Value::Bool(true)));
    }

    #[test]
    fn round_score_bankers() {
        assert_eq!(round_score(Decimal::new(66665, 3)), Decimal::new(6666, 2));
        assert_eq!(round_score(Decimal::new(66675, 3)), Decimal::new(6668, 2));
    }
}
