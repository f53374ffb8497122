//! Column vocabulary shared by the attribute mapper and the schema reconciler.

use serde::{Deserialize, Serialize};

/// Longest identifier Postgres keeps without truncation.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Logical column type. Drives both DDL generation and value coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
}

impl ValueType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ValueType::String => "text",
            ValueType::Integer => "bigint",
            ValueType::Float => "double precision",
            ValueType::Boolean => "boolean",
            ValueType::DateTime => "timestamptz",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub value_type: ValueType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

/// A typed cell. Nulls keep their type so they can be bound correctly.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null(ValueType),
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// ISO-8601 text, parsed by the store.
    DateTime(String),
}

impl ColumnValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            ColumnValue::Null(t) => *t,
            ColumnValue::Text(_) => ValueType::String,
            ColumnValue::Integer(_) => ValueType::Integer,
            ColumnValue::Float(_) => ValueType::Float,
            ColumnValue::Boolean(_) => ValueType::Boolean,
            ColumnValue::DateTime(_) => ValueType::DateTime,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null(_))
    }
}

/// One projected remote record, ready to be upserted.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRow {
    pub key: String,
    pub columns: Vec<(String, ColumnValue)>,
    /// Full remote payload serialised as JSON text.
    pub data: String,
}

impl EntityRow {
    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }
}

/// Lower-case snake identifiers only, so names can be interpolated into DDL.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    name.len() <= MAX_IDENTIFIER_LEN
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
