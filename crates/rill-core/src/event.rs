use std::collections::HashMap;

use rill_lang::ast::FieldPath;

// ---------------------------------------------------------------------------
// Value — dynamic event values
// ---------------------------------------------------------------------------

/// Scalar or nested value carried inside an event record.
///
/// Events are loosely typed; this tagged union plus field-path lookup keeps
/// the DSL's dynamic field access without any reflection. Numbers are always
/// `f64` internally.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
}

impl Value {
    /// Navigate a nested field path. Returns `None` when a segment is
    /// missing or an intermediate value is not an object.
    pub fn get_path(&self, segments: &[String]) -> Option<&Value> {
        let mut current = self;
        for segment in segments {
            match current {
                Value::Object(map) => current = map.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Read this value as a number. Only `Number` coerces; anything else is
    /// a coercion failure handled by the caller.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert to a `serde_json::Value` for the output boundary.
    ///
    /// Whole numbers that fit an `i64` exactly are emitted as JSON integers
    /// so `count` results read as `2`, not `2.0`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() <= 9_007_199_254_740_992.0 {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(out)
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                // Non-finite numbers cannot appear in JSON; 0.0 is unreachable.
                Value::Number(n.as_f64().unwrap_or(0.0))
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An immutable event: a record plus its event-time timestamp. The source
/// stream tag travels alongside at publish time rather than inside the
/// event itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub timestamp_nanos: i64,
    pub record: Value,
}

impl Event {
    pub fn new(timestamp_nanos: i64, record: Value) -> Self {
        Self {
            timestamp_nanos,
            record,
        }
    }

    /// Resolve a field path to a numeric sample, if present and numeric.
    pub fn numeric_field(&self, path: &FieldPath) -> Option<f64> {
        self.record.get_path(&path.segments)?.as_f64()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
