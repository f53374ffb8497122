use pickmirror_common::error::{MirrorError, MirrorResult};
use pickmirror_common::schema::{is_valid_identifier, ColumnSpec};
use serde::Serialize;

/// Columns every entity table carries in addition to its mapped attributes.
pub const BOOKKEEPING_COLUMNS: [(&str, &str); 4] = [
    ("data", "text"),
    ("created_at", "timestamptz not null default now()"),
    ("updated_at", "timestamptz not null default now()"),
    ("last_sync_at", "timestamptz"),
];

/// Physical layout of one entity table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub key_column: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    /// Reject names that cannot be safely interpolated into DDL and mapped
    /// columns that collide with the key or the bookkeeping columns.
    pub fn validate(&self) -> MirrorResult<()> {
        if !is_valid_identifier(&self.name) {
            return Err(MirrorError::Validation(format!(
                "invalid table name: {:?}",
                self.name
            )));
        }
        if !is_valid_identifier(&self.key_column) {
            return Err(MirrorError::Validation(format!(
                "invalid key column for {}: {:?}",
                self.name, self.key_column
            )));
        }

        let mut seen: Vec<&str> = vec![self.key_column.as_str()];
        seen.extend(BOOKKEEPING_COLUMNS.iter().map(|(name, _)| *name));

        for column in &self.columns {
            if !is_valid_identifier(&column.name) {
                return Err(MirrorError::Validation(format!(
                    "invalid column name for {}: {:?}",
                    self.name, column.name
                )));
            }
            if seen.contains(&column.name.as_str()) {
                return Err(MirrorError::Validation(format!(
                    "duplicate or reserved column in {}: {}",
                    self.name, column.name
                )));
            }
            seen.push(&column.name);
        }
        Ok(())
    }
}

/// What `ensure_table` had to do to bring the live table in line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaChange {
    pub created: bool,
    pub added_columns: Vec<String>,
}

impl SchemaChange {
    pub fn is_noop(&self) -> bool {
        !self.created && self.added_columns.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub written: usize,
    pub failed: usize,
}
