//! Purpose: Closed set of scalar kinds that can live in a single SSM parameter.
//! Exports: `Scalar`, `TYPE_TAG_KEY`.
//! Role: Bridges `serde_json::Value` leaves and the string-only remote store.
//! Invariants: `Scalar::tag` is the text stored in the remote `type` tag.
//! Invariants: `Scalar::coerce(scalar.tag(), &scalar.to_remote_string())` returns the same scalar.
use std::fmt;

use serde_json::{Number, Value};

/// Tag key recording a parameter's original scalar kind.
pub const TYPE_TAG_KEY: &str = "type";

const TAG_STRING: &str = "string";
const TAG_BOOL: &str = "bool";
const TAG_FLOAT64: &str = "float64";
const TAG_NIL: &str = "nil";

const NIL_TEXT: &str = "null";

#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    String(String),
    Bool(bool),
    Float64(f64),
    Nil,
}

/// Reason a stored string could not be read back as its tagged kind.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CoerceError {
    pub tag: &'static str,
    pub raw: String,
}

impl fmt::Display for CoerceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value {:?} is not a valid {}", self.raw, self.tag)
    }
}

impl std::error::Error for CoerceError {}

impl Scalar {
    pub fn tag(&self) -> &'static str {
        match self {
            Scalar::String(_) => TAG_STRING,
            Scalar::Bool(_) => TAG_BOOL,
            Scalar::Float64(_) => TAG_FLOAT64,
            Scalar::Nil => TAG_NIL,
        }
    }

    /// Text written as the parameter value.
    pub fn to_remote_string(&self) -> String {
        match self {
            Scalar::String(value) => value.clone(),
            Scalar::Bool(value) => value.to_string(),
            Scalar::Float64(value) => value.to_string(),
            Scalar::Nil => NIL_TEXT.to_string(),
        }
    }

    /// Reads a stored value back using its type tag. Unknown tags pass through as strings.
    pub fn coerce(tag: &str, raw: &str) -> Result<Scalar, CoerceError> {
        match tag {
            TAG_BOOL => raw.parse::<bool>().map(Scalar::Bool).map_err(|_| CoerceError {
                tag: TAG_BOOL,
                raw: raw.to_string(),
            }),
            TAG_FLOAT64 => match raw.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(Scalar::Float64(value)),
                _ => Err(CoerceError {
                    tag: TAG_FLOAT64,
                    raw: raw.to_string(),
                }),
            },
            TAG_NIL => Ok(Scalar::Nil),
            _ => Ok(Scalar::String(raw.to_string())),
        }
    }

    /// Converts a JSON leaf. Containers return `None`.
    pub fn from_json(value: &Value) -> Option<Scalar> {
        match value {
            Value::Null => Some(Scalar::Nil),
            Value::Bool(value) => Some(Scalar::Bool(*value)),
            Value::Number(number) => number.as_f64().map(Scalar::Float64),
            Value::String(value) => Some(Scalar::String(value.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Whole floats inside the i64 range render as JSON integers (`3000`, not `3000.0`).
    pub fn into_json(self) -> Value {
        match self {
            Scalar::String(value) => Value::String(value),
            Scalar::Bool(value) => Value::Bool(value),
            Scalar::Nil => Value::Null,
            Scalar::Float64(value) => {
                if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
                    Value::Number(Number::from(value as i64))
                } else {
                    Number::from_f64(value)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            }
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float64(value)
    }
}

#[cfg(test)]
mod tests {
    use super::Scalar;
    use serde_json::{Value, json};

    #[test]
    fn tags_match_remote_type_names() {
        assert_eq!(Scalar::from("x").tag(), "string");
        assert_eq!(Scalar::Bool(true).tag(), "bool");
        assert_eq!(Scalar::Float64(1.0).tag(), "float64");
        assert_eq!(Scalar::Nil.tag(), "nil");
    }

    #[test]
    fn remote_string_uses_shortest_decimal_form() {
        assert_eq!(Scalar::Float64(3000.0).to_remote_string(), "3000");
        assert_eq!(Scalar::Float64(1.5).to_remote_string(), "1.5");
        assert_eq!(Scalar::Bool(false).to_remote_string(), "false");
        assert_eq!(Scalar::Nil.to_remote_string(), "null");
    }

    #[test]
    fn coerce_reads_back_each_kind() {
        let cases = [
            Scalar::from("melbourne"),
            Scalar::Bool(true),
            Scalar::Float64(3000.0),
            Scalar::Float64(-0.25),
            Scalar::Nil,
        ];
        for scalar in cases {
            let raw = scalar.to_remote_string();
            assert_eq!(Scalar::coerce(scalar.tag(), &raw).unwrap(), scalar);
        }
    }

    #[test]
    fn coerce_rejects_malformed_numbers_and_bools() {
        assert!(Scalar::coerce("float64", "three").is_err());
        assert!(Scalar::coerce("float64", "NaN").is_err());
        assert!(Scalar::coerce("bool", "yes").is_err());
    }

    #[test]
    fn unknown_tag_passes_value_through() {
        assert_eq!(
            Scalar::coerce("int", "42").unwrap(),
            Scalar::String("42".to_string())
        );
    }

    #[test]
    fn whole_floats_render_as_integers() {
        assert_eq!(Scalar::Float64(3000.0).into_json(), json!(3000));
        assert_eq!(Scalar::Float64(2.5).into_json(), json!(2.5));
        assert_eq!(Scalar::Nil.into_json(), Value::Null);
    }
}
