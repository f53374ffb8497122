use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{Acquire, PgPool, Postgres, Row};

use crate::entity::models::{BatchOutcome, SchemaChange, TableSpec, BOOKKEEPING_COLUMNS};
use crate::entity::repositories::EntityRepository;
use pickmirror_common::error::{MirrorError, MirrorResult};
use pickmirror_common::schema::{is_valid_identifier, ColumnValue, EntityRow, ValueType};

#[derive(Clone)]
pub struct PgEntityRepository {
    pool: PgPool,
}

impl PgEntityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn live_columns(&self, table: &str) -> MirrorResult<Vec<String>> {
        let rows = sqlx::query(
            "select column_name::text as column_name
             from information_schema.columns
             where table_schema = current_schema() and table_name = $1",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MirrorError::Database(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|r| r.get::<String, _>("column_name"))
            .collect())
    }

    /// Run one DDL statement. `Ok(false)` means a concurrent run applied the
    /// same change first.
    async fn execute_ddl(&self, sql: &str) -> MirrorResult<bool> {
        tracing::debug!(%sql, "executing ddl");
        match sqlx::query(sql).execute(&self.pool).await {
            Ok(_) => Ok(true),
            Err(e) if lost_ddl_race(e.as_database_error().and_then(|d| d.code()).as_deref()) => {
                tracing::debug!(error = %e, "ddl already applied concurrently");
                Ok(false)
            }
            Err(e) => Err(MirrorError::Database(format!("ddl failed: {e}"))),
        }
    }
}

/// `if not exists` DDL is not atomic in Postgres: two sessions creating the
/// same table or column can both pass the check, and the loser fails on the
/// catalog's unique index instead.
fn lost_ddl_race(sqlstate: Option<&str>) -> bool {
    matches!(
        sqlstate,
        Some("23505") | Some("42P07") | Some("42701")
    )
}

fn create_table_sql(table: &TableSpec) -> String {
    let mut defs = vec![format!("\"{}\" text primary key", table.key_column)];
    defs.extend(
        table
            .columns
            .iter()
            .map(|c| format!("\"{}\" {}", c.name, c.value_type.sql_type())),
    );
    defs.extend(
        BOOKKEEPING_COLUMNS
            .iter()
            .map(|(name, ddl)| format!("\"{name}\" {ddl}")),
    );
    format!(
        "create table if not exists \"{}\" ({})",
        table.name,
        defs.join(", ")
    )
}

fn add_column_sql(table: &str, column: &str, ddl: &str) -> String {
    format!("alter table \"{table}\" add column if not exists \"{column}\" {ddl}")
}

/// Single-statement upsert: the natural-key constraint arbitrates concurrent
/// writers, so two runs for the same entity cannot double-insert.
fn upsert_sql(table: &TableSpec) -> String {
    let mut columns = vec![format!("\"{}\"", table.key_column)];
    let mut values = vec!["$1".to_string()];
    let mut updates = Vec::with_capacity(table.columns.len() + 3);

    for (i, c) in table.columns.iter().enumerate() {
        columns.push(format!("\"{}\"", c.name));
        values.push(format!("${}::{}", i + 2, c.value_type.sql_type()));
        updates.push(format!("\"{0}\" = excluded.\"{0}\"", c.name));
    }

    let data_param = table.columns.len() + 2;
    columns.extend(
        ["data", "created_at", "updated_at", "last_sync_at"]
            .iter()
            .map(|c| c.to_string()),
    );
    values.push(format!("${data_param}"));
    values.extend(["now()", "now()", "now()"].iter().map(|v| v.to_string()));
    updates.push("data = excluded.data".to_string());
    updates.push("updated_at = now()".to_string());
    updates.push("last_sync_at = now()".to_string());

    format!(
        "insert into \"{}\" ({}) values ({}) on conflict (\"{}\") do update set {}",
        table.name,
        columns.join(", "),
        values.join(", "),
        table.key_column,
        updates.join(", ")
    )
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q ColumnValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        ColumnValue::Null(ValueType::String) | ColumnValue::Null(ValueType::DateTime) => {
            query.bind(None::<String>)
        }
        ColumnValue::Null(ValueType::Integer) => query.bind(None::<i64>),
        ColumnValue::Null(ValueType::Float) => query.bind(None::<f64>),
        ColumnValue::Null(ValueType::Boolean) => query.bind(None::<bool>),
        ColumnValue::Text(s) | ColumnValue::DateTime(s) => query.bind(s.as_str()),
        ColumnValue::Integer(i) => query.bind(*i),
        ColumnValue::Float(f) => query.bind(*f),
        ColumnValue::Boolean(b) => query.bind(*b),
    }
}

fn bind_row<'q>(
    sql: &'q str,
    table: &TableSpec,
    row: &'q EntityRow,
    nulls: &'q [ColumnValue],
) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql).bind(row.key.as_str());
    for (spec, null) in table.columns.iter().zip(nulls) {
        let value = row.get(&spec.name).unwrap_or(null);
        query = bind_value(query, value);
    }
    query.bind(row.data.as_str())
}

#[async_trait]
impl EntityRepository for PgEntityRepository {
    async fn ensure_table(&self, table: &TableSpec) -> MirrorResult<SchemaChange> {
        table.validate()?;

        let mut existing = self.live_columns(&table.name).await?;
        if existing.is_empty() {
            if self.execute_ddl(&create_table_sql(table)).await? {
                tracing::info!(table = %table.name, "created entity table");
                return Ok(SchemaChange {
                    created: true,
                    added_columns: Vec::new(),
                });
            }
            existing = self.live_columns(&table.name).await?;
        }

        if !existing.contains(&table.key_column) {
            return Err(MirrorError::Validation(format!(
                "table {} exists without natural key column {}",
                table.name, table.key_column
            )));
        }

        let wanted = table
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c.value_type.sql_type()))
            .chain(BOOKKEEPING_COLUMNS.iter().copied());

        let mut change = SchemaChange::default();
        for (name, ddl) in wanted {
            if existing.iter().any(|e| e == name) {
                continue;
            }
            if self
                .execute_ddl(&add_column_sql(&table.name, name, ddl))
                .await?
            {
                change.added_columns.push(name.to_string());
            }
        }

        if !change.added_columns.is_empty() {
            tracing::info!(
                table = %table.name,
                added = ?change.added_columns,
                "added missing columns"
            );
        }
        Ok(change)
    }

    async fn upsert_batch(
        &self,
        table: &TableSpec,
        rows: &[EntityRow],
    ) -> MirrorResult<BatchOutcome> {
        if rows.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let sql = upsert_sql(table);
        let nulls: Vec<ColumnValue> = table
            .columns
            .iter()
            .map(|c| ColumnValue::Null(c.value_type))
            .collect();
        let mut outcome = BatchOutcome::default();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MirrorError::Database(e.to_string()))?;

        for row in rows {
            // Savepoint per row so one bad record does not poison the batch.
            let mut savepoint = (&mut tx)
                .begin()
                .await
                .map_err(|e| MirrorError::Database(e.to_string()))?;

            match bind_row(&sql, table, row, &nulls)
                .execute(&mut *savepoint)
                .await
            {
                Ok(_) => {
                    savepoint
                        .commit()
                        .await
                        .map_err(|e| MirrorError::Database(e.to_string()))?;
                    outcome.written += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        table = %table.name,
                        key = %row.key,
                        error = %e,
                        "failed to upsert record"
                    );
                    savepoint
                        .rollback()
                        .await
                        .map_err(|e| MirrorError::Database(e.to_string()))?;
                    outcome.failed += 1;
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| MirrorError::Database(e.to_string()))?;

        Ok(outcome)
    }

    async fn count_rows(&self, table: &str) -> MirrorResult<i64> {
        if !is_valid_identifier(table) {
            return Err(MirrorError::Validation(format!(
                "invalid table name: {table:?}"
            )));
        }

        let present: bool = sqlx::query("select to_regclass($1) is not null as present")
            .bind(table)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MirrorError::Database(e.to_string()))?
            .get("present");
        if !present {
            return Ok(0);
        }

        let row = sqlx::query(&format!("select count(*) as cnt from \"{table}\""))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MirrorError::Database(e.to_string()))?;
        Ok(row.get::<i64, _>("cnt"))
    }
}
