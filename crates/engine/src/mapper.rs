//! Projects raw remote records onto typed table rows.

use pickmirror_common::schema::{ColumnValue, EntityRow, ValueType};
use serde_json::Value;

use crate::descriptor::SchemaDescriptor;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    #[error("natural key `{path}` is missing or empty")]
    MissingKey { path: String },

    #[error("required field `{path}` is missing")]
    MissingRequired { path: String },

    #[error("field `{path}` cannot be read as {expected:?}: {found}")]
    InvalidValue {
        path: String,
        expected: ValueType,
        found: String,
    },
}

/// Map one remote record through `descriptor`.
///
/// Missing optional fields become typed nulls. A missing key, a missing
/// required field or a value that cannot be coerced rejects the record.
pub fn extract(raw: &Value, descriptor: &SchemaDescriptor) -> Result<EntityRow, MappingError> {
    let key = lookup(raw, descriptor.key_path)
        .and_then(key_string)
        .ok_or_else(|| MappingError::MissingKey {
            path: descriptor.key_path.to_string(),
        })?;

    let mut columns = Vec::with_capacity(descriptor.fields.len());
    for field in descriptor.fields {
        let value = match lookup(raw, field.remote_path) {
            Some(v) => coerce(v, field.value_type).ok_or_else(|| MappingError::InvalidValue {
                path: field.remote_path.to_string(),
                expected: field.value_type,
                found: v.to_string(),
            })?,
            None => ColumnValue::Null(field.value_type),
        };

        if field.required && value.is_null() {
            return Err(MappingError::MissingRequired {
                path: field.remote_path.to_string(),
            });
        }
        columns.push((field.column.to_string(), value));
    }

    Ok(EntityRow {
        key,
        columns,
        data: raw.to_string(),
    })
}

/// Follow a dotted path. JSON `null` counts as absent.
fn lookup<'a>(raw: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(raw, |current, segment| current.get(segment))
        .filter(|v| !v.is_null())
}

/// Keys are stored as text whatever the remote type, so `42` and `"42"`
/// address the same row.
fn key_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce(value: &Value, value_type: ValueType) -> Option<ColumnValue> {
    if let Value::String(s) = value {
        if s.trim().is_empty() && value_type != ValueType::String {
            return Some(ColumnValue::Null(value_type));
        }
    }

    match value_type {
        ValueType::String => Some(ColumnValue::Text(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        ValueType::Integer => as_integer(value).map(ColumnValue::Integer),
        ValueType::Float => as_float(value).map(ColumnValue::Float),
        ValueType::Boolean => as_boolean(value).map(ColumnValue::Boolean),
        ValueType::DateTime => match value {
            Value::String(s) => Some(ColumnValue::DateTime(s.clone())),
            _ => None,
        },
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15).then_some(f as i64)
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn as_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
