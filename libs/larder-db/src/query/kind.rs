//! Logical field types and filter value shapes.
//!
//! `FieldKind` describes the storage type of a mapped column. Filter values arrive
//! as loosely typed [`FilterValue`]s (already parsed by the transport) and are
//! coerced into bound `sea_query` values according to the kind.

use std::fmt;

use chrono::{DateTime, Utc};
use sea_orm::Value;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Logical field types supported by filter mappings and entity columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    String,
    I64,
    F64,
    Bool,
    Uuid,
    DateTimeUtc,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::String => write!(f, "String"),
            FieldKind::I64 => write!(f, "I64"),
            FieldKind::F64 => write!(f, "F64"),
            FieldKind::Bool => write!(f, "Bool"),
            FieldKind::Uuid => write!(f, "Uuid"),
            FieldKind::DateTimeUtc => write!(f, "DateTimeUtc"),
        }
    }
}

/// A single filter operand.
///
/// Text comes before `Uuid`/`DateTime` so that wire strings always deserialize as
/// `Text`; the mapping's kind decides whether they are parsed further.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
}

impl Scalar {
    /// Short shape name used in error messages. Never includes the value itself.
    #[must_use]
    pub fn shape(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "integer",
            Scalar::Float(_) => "float",
            Scalar::Text(_) => "string",
            Scalar::Uuid(_) => "uuid",
            Scalar::DateTime(_) => "datetime",
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(i64::from(v))
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl From<Uuid> for Scalar {
    fn from(v: Uuid) -> Self {
        Scalar::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(v: DateTime<Utc>) -> Self {
        Scalar::DateTime(v)
    }
}

/// Right-hand side of a filter specification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Used by `is_null` / `is_not_null`.
    Null,
    /// Used by `in`, `not_in` and `between`.
    List(Vec<Scalar>),
    Scalar(Scalar),
}

impl FilterValue {
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Scalar>,
    {
        FilterValue::List(items.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn shape(&self) -> &'static str {
        match self {
            FilterValue::Null => "null",
            FilterValue::List(_) => "list",
            FilterValue::Scalar(s) => s.shape(),
        }
    }
}

macro_rules! scalar_filter_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for FilterValue {
                fn from(v: $t) -> Self {
                    FilterValue::Scalar(v.into())
                }
            }
        )*
    };
}

scalar_filter_value!(bool, i64, i32, f64, &str, String, Uuid, DateTime<Utc>, Scalar);

impl<T: Into<Scalar>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self {
        FilterValue::list(v)
    }
}

impl<T: Into<Scalar>, const N: usize> From<[T; N]> for FilterValue {
    fn from(v: [T; N]) -> Self {
        FilterValue::list(v)
    }
}

/// A filter value after coercion: the operand shape is preserved, every scalar is
/// a bound `sea_query` value of the mapped column's type.
#[derive(Clone, Debug, PartialEq)]
pub enum CoercedValue {
    Null,
    One(Value),
    Many(Vec<Value>),
}

impl CoercedValue {
    /// Number of operands, used for arity diagnostics.
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            CoercedValue::Null => 0,
            CoercedValue::One(_) => 1,
            CoercedValue::Many(v) => v.len(),
        }
    }
}

/* ---------- coercion helpers ---------- */

impl FieldKind {
    /// Convert one operand into a bound value of this kind.
    ///
    /// # Errors
    /// Returns a human-readable reason when the operand shape does not fit the kind.
    pub fn coerce(self, v: &Scalar) -> Result<Value, String> {
        Ok(match (self, v) {
            (FieldKind::String, Scalar::Text(s)) => s.clone().into(),
            (FieldKind::I64, Scalar::Int(i)) => (*i).into(),
            (FieldKind::F64, Scalar::Float(f)) => (*f).into(),
            (FieldKind::F64, Scalar::Int(i)) => int_to_f64(*i)?.into(),
            (FieldKind::Bool, Scalar::Bool(b)) => (*b).into(),
            (FieldKind::Uuid, Scalar::Uuid(u)) => (*u).into(),
            (FieldKind::Uuid, Scalar::Text(s)) => s
                .parse::<Uuid>()
                .map_err(|_| "expected a uuid string".to_owned())?
                .into(),
            (FieldKind::DateTimeUtc, Scalar::DateTime(dt)) => (*dt).into(),
            (FieldKind::DateTimeUtc, Scalar::Text(s)) => DateTime::parse_from_rfc3339(s)
                .map_err(|_| "expected an RFC 3339 timestamp".to_owned())?
                .with_timezone(&Utc)
                .into(),
            (expected, got) => {
                return Err(format!("expected {expected}, got {}", got.shape()));
            }
        })
    }
}

// Integers beyond 2^53 would silently lose precision as floats.
fn int_to_f64(i: i64) -> Result<f64, String> {
    const MAX_EXACT: i64 = 1 << 53;
    if (-MAX_EXACT..=MAX_EXACT).contains(&i) {
        #[allow(clippy::cast_precision_loss)]
        Ok(i as f64)
    } else {
        Err("integer too large for a float column".to_owned())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn uuid_kind_accepts_uuid_text_and_rejects_plain_text() {
        let id = Uuid::new_v4();
        assert_eq!(
            FieldKind::Uuid.coerce(&Scalar::Text(id.to_string())),
            Ok(Value::from(id))
        );
        let err = FieldKind::Uuid
            .coerce(&Scalar::Text("not-a-uuid".to_owned()))
            .unwrap_err();
        assert!(err.contains("uuid"));
    }

    #[test]
    fn float_kind_widens_integers() {
        assert_eq!(
            FieldKind::F64.coerce(&Scalar::Int(30)),
            Ok(Value::from(30.0_f64))
        );
    }

    #[test]
    fn mismatched_shape_reports_kind_and_shape() {
        let err = FieldKind::I64.coerce(&Scalar::Bool(true)).unwrap_err();
        assert_eq!(err, "expected I64, got bool");
    }

    #[test]
    fn wire_values_deserialize_into_expected_shapes() {
        let v: FilterValue = serde_json::from_str("null").unwrap();
        assert_eq!(v, FilterValue::Null);

        let v: FilterValue = serde_json::from_str(r#"["vegan", "quick"]"#).unwrap();
        assert_eq!(v, FilterValue::from(["vegan", "quick"]));

        let v: FilterValue = serde_json::from_str("30").unwrap();
        assert_eq!(v, FilterValue::Scalar(Scalar::Int(30)));

        let v: FilterValue =
            serde_json::from_str(r#""6f1c2a57-0e56-4b8e-9f0a-0c1b7c9d8e7f""#).unwrap();
        assert!(matches!(v, FilterValue::Scalar(Scalar::Text(_))));
    }
}
