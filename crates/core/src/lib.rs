//! Eligo data model -- values, operators, criteria and rule builders.
//!
//! This crate is the pure model layer: typed field values, the operator
//! enumeration with its expected-value shape rules, and the builders that
//! assemble a `Criteria` with all constraints checked up front. The
//! evaluation engine lives in `eligo-eval`; persistence contracts live in
//! `eligo-storage`.

pub mod builder;
pub mod criteria;
pub mod error;
pub mod operator;
pub mod value;

pub use builder::{slugify, CriteriaBuilder, RuleBuilder};
pub use criteria::{Criteria, DecisionBand, Rule, ScoringMethod};
pub use error::ModelError;
pub use operator::{compile_pattern, OperatorKind};
pub use value::{json_decimal, lookup_path, parse_decimal_literal, Value};
