//! Typed values extracted from input records.
//!
//! The engine consumes a flat JSON object (field -> value) produced by the
//! host application. Internally every field is converted to a `Value` so
//! that operator evaluation never touches raw JSON. Numbers are held as
//! `i64` or `rust_decimal::Decimal` -- no `f64` in the evaluation path.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;

/// A typed value at some field path of an input record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Text(String),
    List(Vec<Value>),
    Record(BTreeMap<String, Value>),
}

impl Value {
    /// Convert a JSON value into a `Value`.
    ///
    /// Integers stay `Int`; other JSON numbers become `Decimal` (parsed
    /// from the number's literal text, so no binary-float round-trip).
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    let literal = n.to_string();
                    match parse_decimal_literal(&literal) {
                        Some(d) => Value::Decimal(d),
                        None => Value::Text(literal),
                    }
                }
            }
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(fields) => Value::Record(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert back to JSON (for result payloads and audit context).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Decimal(d) => {
                // Decimal round-trips through its canonical string form;
                // fall back to the string itself if it exceeds f64 range.
                serde_json::Number::from_str(&d.to_string())
                    .map(serde_json::Value::Number)
                    .unwrap_or_else(|_| serde_json::Value::String(d.to_string()))
            }
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Record(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Decimal(_) => "Decimal",
            Value::Text(_) => "Text",
            Value::List(_) => "List",
            Value::Record(_) => "Record",
        }
    }

    /// Absence semantics: null, empty string, empty collection.
    pub fn is_absent(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Record(fields) => fields.is_empty(),
            _ => false,
        }
    }
}

/// Look up a dotted field path in an input record.
///
/// Path segments traverse nested objects; a segment that parses as an
/// index steps into a list (`"addresses.0.city"`). Returns None when any
/// segment is missing.
pub fn lookup_path<'a>(record: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = record;
    for segment in path.split('.') {
        current = match current {
            serde_json::Value::Object(fields) => fields.get(segment)?,
            serde_json::Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Parse a decimal out of a number literal, accepting scientific notation.
pub fn parse_decimal_literal(literal: &str) -> Option<Decimal> {
    Decimal::from_str(literal)
        .or_else(|_| Decimal::from_scientific(literal))
        .ok()
}

/// Coerce a JSON value to a decimal: numbers directly, numeric-looking
/// strings by parsing. Everything else is not numeric.
pub fn json_decimal(json: &serde_json::Value) -> Option<Decimal> {
    match json {
        serde_json::Value::Number(n) => parse_decimal_literal(&n.to_string()),
        serde_json::Value::String(s) => parse_decimal_literal(s.trim()),
        _ => None,
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_integer_stays_int() {
        let v = Value::from_json(&serde_json::json!(42));
        assert_eq!(v, Value::Int(42));
    }

    #[test]
    fn from_json_fraction_becomes_decimal() {
        let v = Value::from_json(&serde_json::json!(12.5));
        assert_eq!(v, Value::Decimal(Decimal::new(125, 1)));
    }

    #[test]
    fn json_round_trip() {
        let json = serde_json::json!({
            "name": "ada",
            "age": 37,
            "scores": [1, 2.5],
            "active": true,
            "note": null
        });
        let v = Value::from_json(&json);
        assert_eq!(v.to_json(), json);
    }

    #[test]
    fn lookup_nested_path() {
        let record = serde_json::json!({
            "applicant": { "income": 5000, "addresses": [{"city": "Oslo"}] }
        });
        assert_eq!(
            lookup_path(&record, "applicant.income"),
            Some(&serde_json::json!(5000))
        );
        assert_eq!(
            lookup_path(&record, "applicant.addresses.0.city"),
            Some(&serde_json::json!("Oslo"))
        );
        assert_eq!(lookup_path(&record, "applicant.missing"), None);
        assert_eq!(lookup_path(&record, "applicant.addresses.7.city"), None);
    }

    #[test]
    fn absence_semantics() {
        assert!(Value::Null.is_absent());
        assert!(Value::Text(String::new()).is_absent());
        assert!(Value::List(vec![]).is_absent());
        assert!(Value::Record(BTreeMap::new()).is_absent());
        assert!(!Value::Int(0).is_absent());
        assert!(!Value::Bool(false).is_absent());
        assert!(!Value::Text(" ".to_string()).is_absent());
    }

    #[test]
    fn json_decimal_coerces_numeric_strings() {
        assert_eq!(
            json_decimal(&serde_json::json!("3000")),
            Some(Decimal::from(3000))
        );
        assert_eq!(
            json_decimal(&serde_json::json!(" 12.50 ")),
            Some(Decimal::new(1250, 2))
        );
        assert_eq!(json_decimal(&serde_json::json!("abc")), None);
        assert_eq!(json_decimal(&serde_json::json!(true)), None);
    }
}
