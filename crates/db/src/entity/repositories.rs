use async_trait::async_trait;

use crate::entity::models::{BatchOutcome, SchemaChange, TableSpec};
use pickmirror_common::error::MirrorResult;
use pickmirror_common::schema::EntityRow;

#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Create the table if absent, otherwise add any missing columns.
    /// Never alters or drops existing columns.
    async fn ensure_table(&self, table: &TableSpec) -> MirrorResult<SchemaChange>;

    /// Upsert rows keyed by the natural key inside one transaction.
    /// A failing row is rolled back on its own and counted in `failed`;
    /// an `Err` means the batch as a whole was not committed.
    async fn upsert_batch(&self, table: &TableSpec, rows: &[EntityRow])
        -> MirrorResult<BatchOutcome>;

    /// Row count, or 0 when the table has not been created yet.
    async fn count_rows(&self, table: &str) -> MirrorResult<i64>;
}
