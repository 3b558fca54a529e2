//! Scalar node payloads and the type coercion table.

use std::path::PathBuf;

use crate::base::{EnumMember, Value, ValueKind};
use crate::errors::{ConfigError, Result};
use crate::grammar::{self, literals};

/// The runtime value of a scalar node.
///
/// `Missing` is the `???` sentinel: a mandatory value not yet provided. It
/// compares unequal to null and to every concrete value. `Interp` holds the
/// raw text of a syntactically valid interpolation expression; semantic
/// resolution happens on access.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Missing,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Path(PathBuf),
    Enum(EnumMember),
    Interp(String),
}

impl ScalarValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_interp(&self) -> bool {
        matches!(self, Self::Interp(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Missing => "???",
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::Path(_) => "path",
            Self::Enum(_) => "enum",
            Self::Interp(_) => "interpolation",
        }
    }

    /// The inverse of [`ScalarValue::to_plain`]: store an already-resolved
    /// plain scalar without re-interpreting expression-looking strings.
    /// Containers have no scalar form.
    pub fn from_plain(value: &Value) -> Option<ScalarValue> {
        match value {
            Value::List(_) | Value::Map(_) => None,
            Value::Null => Some(ScalarValue::Null),
            Value::Bool(b) => Some(ScalarValue::Bool(*b)),
            Value::Int(i) => Some(ScalarValue::Int(*i)),
            Value::Float(f) => Some(ScalarValue::Float(*f)),
            Value::Str(s) => Some(ScalarValue::Str(s.clone())),
            Value::Bytes(b) => Some(ScalarValue::Bytes(b.clone())),
            Value::Path(p) => Some(ScalarValue::Path(p.clone())),
            Value::Enum(m) => Some(ScalarValue::Enum(m.clone())),
        }
    }

    /// Project a concrete value to its plain form. `Missing` and `Interp`
    /// have no plain form and return `None`; callers decide how to surface
    /// them.
    pub fn to_plain(&self) -> Option<Value> {
        match self {
            Self::Missing | Self::Interp(_) => None,
            Self::Null => Some(Value::Null),
            Self::Bool(b) => Some(Value::Bool(*b)),
            Self::Int(i) => Some(Value::Int(*i)),
            Self::Float(f) => Some(Value::Float(*f)),
            Self::Str(s) => Some(Value::Str(s.clone())),
            Self::Bytes(b) => Some(Value::Bytes(b.clone())),
            Self::Path(p) => Some(Value::Path(p.clone())),
            Self::Enum(m) => Some(Value::Enum(m.clone())),
        }
    }
}

/// A scalar node: runtime value plus declared kind and optionality.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarNode {
    pub value: ScalarValue,
    pub kind: ValueKind,
    pub optional: bool,
}

impl ScalarNode {
    pub fn new(value: ScalarValue, kind: ValueKind, optional: bool) -> Self {
        Self {
            value,
            kind,
            optional,
        }
    }

    /// An untyped scalar holding the given value.
    pub fn any(value: ScalarValue) -> Self {
        Self::new(value, ValueKind::Any, true)
    }
}

/// Coerce a plain value for storage in a scalar of the given declared kind.
///
/// Strings containing `${` become interpolation expressions after a syntax
/// check, regardless of the declared kind; the expression is re-coerced when
/// resolved. Coercions that would lose information fail with a validation
/// error carrying `full_key` and the offending raw value.
pub fn coerce(value: &Value, kind: &ValueKind, optional: bool, full_key: &str) -> Result<ScalarValue> {
    if let Value::Str(s) = value {
        if s == "???" {
            return Ok(ScalarValue::Missing);
        }
        if grammar::contains_interp(s) {
            grammar::parse_text(s)?;
            return Ok(ScalarValue::Interp(s.clone()));
        }
    }
    if value.is_null() {
        if optional {
            return Ok(ScalarValue::Null);
        }
        return Err(ConfigError::validation(
            full_key,
            "null",
            format!("{kind} (not optional)"),
        ));
    }
    if value.is_container() {
        return Err(ConfigError::type_error(
            full_key,
            kind.to_string(),
            value.type_name(),
        ));
    }

    let fail = || ConfigError::validation(full_key, value.to_string(), kind.to_string());

    match kind {
        ValueKind::Any => Ok(plain_to_scalar(value)),
        ValueKind::Bool => match value {
            Value::Bool(b) => Ok(ScalarValue::Bool(*b)),
            Value::Str(s) => literals::parse_bool_relaxed(s)
                .map(ScalarValue::Bool)
                .ok_or_else(fail),
            _ => Err(fail()),
        },
        ValueKind::Int => match value {
            Value::Int(i) => Ok(ScalarValue::Int(*i)),
            Value::Float(f) => float_to_int(*f).map(ScalarValue::Int).ok_or_else(fail),
            Value::Str(s) => literals::parse_int_literal(s)
                .map(ScalarValue::Int)
                .ok_or_else(fail),
            _ => Err(fail()),
        },
        ValueKind::Float => match value {
            Value::Float(f) => Ok(ScalarValue::Float(*f)),
            Value::Int(i) => Ok(ScalarValue::Float(*i as f64)),
            Value::Str(s) => literals::parse_float_literal(s)
                .map(ScalarValue::Float)
                .ok_or_else(fail),
            _ => Err(fail()),
        },
        ValueKind::Str => Ok(ScalarValue::Str(value.to_string())),
        ValueKind::Bytes => match value {
            Value::Bytes(b) => Ok(ScalarValue::Bytes(b.clone())),
            _ => Err(fail()),
        },
        ValueKind::Path => match value {
            Value::Path(p) => Ok(ScalarValue::Path(p.clone())),
            Value::Str(s) => Ok(ScalarValue::Path(PathBuf::from(s))),
            _ => Err(fail()),
        },
        ValueKind::Enum(class) => match value {
            Value::Enum(member) if member.class().name() == class.name() => {
                Ok(ScalarValue::Enum(member.clone()))
            }
            Value::Str(s) => class.member_by_name(s).map(ScalarValue::Enum).ok_or_else(fail),
            Value::Int(i) => usize::try_from(*i)
                .ok()
                .and_then(|ordinal| class.member_by_ordinal(ordinal))
                .map(ScalarValue::Enum)
                .ok_or_else(fail),
            _ => Err(fail()),
        },
        ValueKind::Union(arms) => {
            // Union arms match exactly; no cross-arm coercion.
            for arm in arms {
                let matches_arm = match (arm, value) {
                    (ValueKind::Bool, Value::Bool(_))
                    | (ValueKind::Int, Value::Int(_))
                    | (ValueKind::Float, Value::Float(_))
                    | (ValueKind::Str, Value::Str(_))
                    | (ValueKind::Bytes, Value::Bytes(_))
                    | (ValueKind::Path, Value::Path(_)) => true,
                    (ValueKind::Enum(class), Value::Enum(member)) => {
                        member.class().name() == class.name()
                    }
                    _ => false,
                };
                if matches_arm {
                    return Ok(plain_to_scalar(value));
                }
            }
            Err(fail())
        }
    }
}

/// Map a plain scalar value onto its scalar-node form without coercion.
fn plain_to_scalar(value: &Value) -> ScalarValue {
    match value {
        Value::Null => ScalarValue::Null,
        Value::Bool(b) => ScalarValue::Bool(*b),
        Value::Int(i) => ScalarValue::Int(*i),
        Value::Float(f) => ScalarValue::Float(*f),
        Value::Str(s) => ScalarValue::Str(s.clone()),
        Value::Bytes(b) => ScalarValue::Bytes(b.clone()),
        Value::Path(p) => ScalarValue::Path(p.clone()),
        Value::Enum(m) => ScalarValue::Enum(m.clone()),
        Value::List(_) | Value::Map(_) => unreachable!("containers rejected before dispatch"),
    }
}

/// Floats that are exactly integral convert to int; everything else fails.
fn float_to_int(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::base::EnumClass;

    use super::*;

    fn c(value: Value, kind: ValueKind) -> Result<ScalarValue> {
        coerce(&value, &kind, false, "test")
    }

    #[rstest]
    #[case("true", true)]
    #[case("False", false)]
    #[case("ON", true)]
    #[case("off", false)]
    #[case("yes", true)]
    #[case("No", false)]
    fn test_bool_from_string(#[case] src: &str, #[case] expected: bool) {
        assert_eq!(
            c(Value::from(src), ValueKind::Bool).unwrap(),
            ScalarValue::Bool(expected)
        );
    }

    #[test]
    fn test_bool_rejects_numbers() {
        assert!(c(Value::from(1i64), ValueKind::Bool).is_err());
        assert!(c(Value::from("2"), ValueKind::Bool).is_err());
    }

    #[test]
    fn test_int_from_string_and_float() {
        assert_eq!(
            c(Value::from("1_000"), ValueKind::Int).unwrap(),
            ScalarValue::Int(1000)
        );
        assert_eq!(
            c(Value::from(3.0), ValueKind::Int).unwrap(),
            ScalarValue::Int(3)
        );
        assert!(c(Value::from(3.5), ValueKind::Int).is_err());
        assert!(c(Value::from("oops"), ValueKind::Int).is_err());
    }

    #[test]
    fn test_float_accepts_reserved_tokens() {
        assert_eq!(
            c(Value::from("inf"), ValueKind::Float).unwrap(),
            ScalarValue::Float(f64::INFINITY)
        );
        assert_eq!(
            c(Value::from(2i64), ValueKind::Float).unwrap(),
            ScalarValue::Float(2.0)
        );
    }

    #[test]
    fn test_str_stringifies_scalars() {
        assert_eq!(
            c(Value::from(1234i64), ValueKind::Str).unwrap(),
            ScalarValue::Str("1234".into())
        );
        assert_eq!(
            c(Value::from(true), ValueKind::Str).unwrap(),
            ScalarValue::Str("true".into())
        );
    }

    #[test]
    fn test_null_requires_optional() {
        assert!(coerce(&Value::Null, &ValueKind::Int, false, "k").is_err());
        assert_eq!(
            coerce(&Value::Null, &ValueKind::Int, true, "k").unwrap(),
            ScalarValue::Null
        );
    }

    #[test]
    fn test_interpolation_bypasses_kind() {
        let got = c(Value::from("${a.b}"), ValueKind::Int).unwrap();
        assert_eq!(got, ScalarValue::Interp("${a.b}".into()));
        // Syntactically invalid expressions are rejected at assignment.
        assert!(c(Value::from("${unclosed"), ValueKind::Int).is_err());
    }

    #[test]
    fn test_enum_lookup_forms() {
        let class = EnumClass::new("Color", ["RED", "GREEN"]);
        let kind = ValueKind::Enum(class.clone());
        let by_name = c(Value::from("GREEN"), kind.clone()).unwrap();
        let by_qualified = c(Value::from("Color.GREEN"), kind.clone()).unwrap();
        let by_ordinal = c(Value::from(1i64), kind.clone()).unwrap();
        assert_eq!(by_name, by_qualified);
        assert_eq!(by_name, by_ordinal);
        assert!(c(Value::from("PURPLE"), kind).is_err());
    }

    #[test]
    fn test_union_exact_match_only() {
        let kind = ValueKind::Union(vec![ValueKind::Int, ValueKind::Str]);
        assert_eq!(
            c(Value::from(3i64), kind.clone()).unwrap(),
            ScalarValue::Int(3)
        );
        assert_eq!(
            c(Value::from("x"), kind.clone()).unwrap(),
            ScalarValue::Str("x".into())
        );
        // A float that happens to be integral does not cross-coerce.
        assert!(c(Value::from(3.0), kind.clone()).is_err());
        assert!(c(Value::from(true), kind).is_err());
    }

    #[test]
    fn test_validation_error_carries_path_and_value() {
        let err = coerce(&Value::from("oops"), &ValueKind::Int, false, "server.port").unwrap_err();
        match err {
            ConfigError::Validation {
                full_key, value, ..
            } => {
                assert_eq!(full_key, "server.port");
                assert_eq!(value, "oops");
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn test_missing_compares_unequal_to_null() {
        assert_ne!(ScalarValue::Missing, ScalarValue::Null);
        assert_ne!(ScalarValue::Missing, ScalarValue::Str("???".into()));
    }

    #[test]
    fn test_question_marks_assign_as_missing() {
        let got = coerce(&Value::from("???"), &ValueKind::Int, false, "k").unwrap();
        assert_eq!(got, ScalarValue::Missing);
    }
}
