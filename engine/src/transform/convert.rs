//! Coercion of extracted values into the type a schema field declares.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Number, Value};
use std::fmt;

/// Scalar types a leaf schema node can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    String,
    /// `"type": "string"` with `"format": "date-time"`
    DateTime,
    Integer,
    Number,
    Boolean,
}

impl ScalarType {
    /// Resolve from a schema `type` name and optional `format`.
    pub fn from_name(name: &str, format: Option<&str>) -> Option<Self> {
        match name {
            "string" if format == Some("date-time") => Some(ScalarType::DateTime),
            "string" => Some(ScalarType::String),
            "integer" => Some(ScalarType::Integer),
            "number" => Some(ScalarType::Number),
            "boolean" => Some(ScalarType::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::String => "string",
            ScalarType::DateTime => "date-time",
            ScalarType::Integer => "integer",
            ScalarType::Number => "number",
            ScalarType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// What a transformer node expects a source to hand back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredType {
    Scalar(ScalarType),
    Array,
}

/// Short name of a JSON value's kind, used in error messages.
pub fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Text form of a scalar value; `None` for null, arrays and objects.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Convert a value to the declared scalar type.
///
/// `Ok(None)` means the value is absent after conversion (JSON null, or an
/// empty string for types that have no empty representation).
pub fn coerce(value: &Value, ty: ScalarType) -> Result<Option<Value>, String> {
    if value.is_null() {
        return Ok(None);
    }
    match ty {
        ScalarType::String => match value {
            Value::Array(_) | Value::Object(_) => Err(format!("cannot use {} as string", kind(value))),
            other => Ok(as_text(other).map(Value::String)),
        },
        ScalarType::DateTime => to_date_time(value),
        ScalarType::Integer => to_integer(value),
        ScalarType::Number => to_number(value),
        ScalarType::Boolean => to_boolean(value),
    }
}

/// Convert raw document text (XML text nodes, attribute values).
pub fn from_text(text: &str, ty: ScalarType) -> Result<Option<Value>, String> {
    coerce(&Value::String(text.to_owned()), ty)
}

fn to_date_time(value: &Value) -> Result<Option<Value>, String> {
    let parsed: DateTime<Utc> = match value {
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .map_err(|e| format!("invalid date-time {s:?}: {e}"))?
            .with_timezone(&Utc),
        Value::Number(n) => {
            let secs = n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .ok_or_else(|| format!("invalid unix timestamp {n}"))?;
            DateTime::from_timestamp(secs, 0).ok_or_else(|| format!("unix timestamp {secs} out of range"))?
        }
        other => return Err(format!("cannot use {} as date-time", kind(other))),
    };
    Ok(Some(Value::String(parsed.to_rfc3339_opts(SecondsFormat::AutoSi, true))))
}

fn to_integer(value: &Value) -> Result<Option<Value>, String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(Some(Value::from(i)));
            }
            if let Some(u) = n.as_u64() {
                return Ok(Some(Value::from(u)));
            }
            n.as_f64()
                .and_then(whole_i64)
                .map(|i| Some(Value::from(i)))
                .ok_or_else(|| format!("{n} is not an integer"))
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Some(Value::from(i)));
            }
            s.parse::<f64>()
                .ok()
                .and_then(whole_i64)
                .map(|i| Some(Value::from(i)))
                .ok_or_else(|| format!("{s:?} is not an integer"))
        }
        other => Err(format!("cannot use {} as integer", kind(other))),
    }
}

/// A float with no fractional part that fits in an i64 without saturating.
fn whole_i64(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn to_number(value: &Value) -> Result<Option<Value>, String> {
    match value {
        Value::Number(_) => Ok(Some(value.clone())),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Some(Value::from(i)));
            }
            s.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(|n| Some(Value::Number(n)))
                .ok_or_else(|| format!("{s:?} is not a number"))
        }
        other => Err(format!("cannot use {} as number", kind(other))),
    }
}

fn to_boolean(value: &Value) -> Result<Option<Value>, String> {
    match value {
        Value::Bool(_) => Ok(Some(value.clone())),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "true" => Ok(Some(Value::Bool(true))),
            "false" => Ok(Some(Value::Bool(false))),
            _ => Err(format!("{s:?} is not a boolean")),
        },
        other => Err(format!("cannot use {} as boolean", kind(other))),
    }
}
