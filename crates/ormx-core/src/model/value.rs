//! Value model
//!
//! `Value` is what a model field reads as and is assigned from. `DbValue` is
//! what crosses the `Database` boundary: positional parameters going out and
//! raw row cells coming back. `ParameterKind` (see `schema`) converts between
//! the two.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::errors::{OrmError, Result};

/// A model field value
///
/// Equality is what dirty checking relies on, so floats compare by bit
/// pattern: a NaN equals itself and `0.0` differs from `-0.0`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Short name of the variant, used in type mismatch errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

/// A raw value as the database driver sees it
///
/// Floats compare by bit pattern, as in `Value`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DbValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl DbValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            DbValue::Null => "null",
            DbValue::Integer(_) => "integer",
            DbValue::Float(_) => "float",
            DbValue::Text(_) => "text",
        }
    }
}

impl PartialEq for DbValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DbValue::Null, DbValue::Null) => true,
            (DbValue::Integer(a), DbValue::Integer(b)) => a == b,
            (DbValue::Float(a), DbValue::Float(b)) => a.to_bits() == b.to_bits(),
            (DbValue::Text(a), DbValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

/// Conversion from a typed model field into a `Value`
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Conversion from a `Value` into a typed model field
///
/// `column` is only used to give errors their context.
pub trait FromValue: Sized {
    /// # Errors
    ///
    /// Returns `TypeMismatch` when the value's variant does not fit `Self`.
    fn from_value(value: Value, column: &str) -> Result<Self>;
}

fn mismatch(column: &str, expected: &str, found: &Value) -> OrmError {
    OrmError::TypeMismatch {
        column: column.to_string(),
        expected: expected.to_string(),
        found: found.type_name().to_string(),
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: Value, _column: &str) -> Result<Self> {
        Ok(value)
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        Value::Integer(self)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value, column: &str) -> Result<Self> {
        match value {
            Value::Integer(v) => Ok(v),
            other => Err(mismatch(column, "integer", &other)),
        }
    }
}

impl IntoValue for i32 {
    fn into_value(self) -> Value {
        Value::Integer(i64::from(self))
    }
}

impl FromValue for i32 {
    fn from_value(value: Value, column: &str) -> Result<Self> {
        match value {
            Value::Integer(v) => i32::try_from(v).map_err(|_| OrmError::TypeMismatch {
                column: column.to_string(),
                expected: "32-bit integer".to_string(),
                found: format!("integer {}", v),
            }),
            other => Err(mismatch(column, "integer", &other)),
        }
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value, column: &str) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Integer(v) => Ok(v as f64),
            other => Err(mismatch(column, "float", &other)),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl FromValue for String {
    fn from_value(value: Value, column: &str) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(mismatch(column, "text", &other)),
        }
    }
}

impl IntoValue for NaiveDateTime {
    fn into_value(self) -> Value {
        Value::Timestamp(self)
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value, column: &str) -> Result<Self> {
        match value {
            Value::Timestamp(v) => Ok(v),
            other => Err(mismatch(column, "timestamp", &other)),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value, column: &str) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other, column).map(Some),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    v.into_value()
                }
            }
        )+
    };
}

value_from!(i64, i32, f64, String, &str, NaiveDateTime);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_option_round_trips_null() {
        let none: Option<String> = None;
        assert_eq!(none.into_value(), Value::Null);
        let back: Option<String> = FromValue::from_value(Value::Null, "title").unwrap();
        assert_eq!(back, None);
    }

    #[test]
    fn test_wrong_variant_is_type_mismatch() {
        let err = String::from_value(Value::Integer(3), "title").unwrap_err();
        assert_eq!(
            err,
            OrmError::TypeMismatch {
                column: "title".to_string(),
                expected: "text".to_string(),
                found: "integer".to_string(),
            }
        );
    }

    #[test]
    fn test_float_accepts_integer() {
        assert_eq!(f64::from_value(Value::Integer(2), "price").unwrap(), 2.0);
    }

    #[test]
    fn test_nan_equals_itself() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_eq!(DbValue::Float(f64::NAN), DbValue::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Float(1.0), Value::Integer(1));
    }

    #[test]
    fn test_i32_rejects_overflow() {
        let result = i32::from_value(Value::Integer(i64::MAX), "count");
        assert!(matches!(result, Err(OrmError::TypeMismatch { .. })));
    }

    #[test]
    fn test_timestamp_serializes_as_string() {
        let ts = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        let json = serde_json::to_value(Value::Timestamp(ts)).unwrap();
        assert!(json.is_string());
        assert_eq!(serde_json::to_value(Value::Null).unwrap(), serde_json::Value::Null);
    }
}
