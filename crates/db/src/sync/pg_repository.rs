use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::sync::models::{RunOutcome, RunState, SyncRun, SyncWatermark};
use crate::sync::repositories::{SyncRunRepository, SyncWatermarkRepository};
use pickmirror_common::entity::EntityType;
use pickmirror_common::error::{MirrorError, MirrorResult};

const RUN_COLUMNS: &str =
    "run_id, entity_type, status, started_at, ended_at, items_synced, items_failed, error_message";

const WATERMARK_COLUMNS: &str =
    "entity_type, last_sync_at, total_available, total_synced, updated_at";

#[derive(Clone)]
pub struct PgSyncRepository {
    pool: PgPool,
}

impl PgSyncRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_entity(raw: &str) -> MirrorResult<EntityType> {
        raw.parse()
            .map_err(|_| MirrorError::Database(format!("unknown entity type in row: {raw}")))
    }

    fn map_run(row: sqlx::postgres::PgRow) -> MirrorResult<SyncRun> {
        let status: String = row.get("status");
        let items_synced: i64 = row.get("items_synced");
        let items_failed: i64 = row.get("items_failed");
        let error_message: Option<String> = row.get("error_message");

        let state = match status.as_str() {
            "in_progress" => RunState::InProgress,
            "completed" => RunState::Completed {
                items_synced,
                items_failed,
            },
            "failed" => RunState::Failed {
                items_synced,
                items_failed,
                error_message: error_message.unwrap_or_default(),
            },
            other => {
                return Err(MirrorError::Database(format!(
                    "unknown run status in row: {other}"
                )))
            }
        };

        Ok(SyncRun {
            run_id: row.get("run_id"),
            entity_type: Self::parse_entity(row.get("entity_type"))?,
            started_at: row.get("started_at"),
            ended_at: row.get("ended_at"),
            state,
        })
    }

    fn map_watermark(row: sqlx::postgres::PgRow) -> MirrorResult<SyncWatermark> {
        Ok(SyncWatermark {
            entity_type: Self::parse_entity(row.get("entity_type"))?,
            last_sync_at: row.get("last_sync_at"),
            total_available: row.get("total_available"),
            total_synced: row.get("total_synced"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl SyncRunRepository for PgSyncRepository {
    async fn create_run(
        &self,
        run_id: &str,
        entity_type: EntityType,
        started_at: DateTime<Utc>,
    ) -> MirrorResult<SyncRun> {
        let row = sqlx::query(&format!(
            "insert into sync_runs (run_id, entity_type, status, started_at)
             values ($1, $2, 'in_progress', $3)
             on conflict (run_id) do nothing
             returning {RUN_COLUMNS}"
        ))
        .bind(run_id)
        .bind(entity_type.as_str())
        .bind(started_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MirrorError::Database(e.to_string()))?;

        match row {
            Some(r) => Self::map_run(r),
            None => Err(MirrorError::Validation(format!(
                "sync run {run_id} already exists"
            ))),
        }
    }

    async fn finish_run(&self, run_id: &str, outcome: RunOutcome) -> MirrorResult<SyncRun> {
        let (status, items_synced, items_failed, error_message) = match &outcome {
            RunOutcome::Completed {
                items_synced,
                items_failed,
            } => ("completed", *items_synced, *items_failed, None),
            RunOutcome::Failed {
                items_synced,
                items_failed,
                error_message,
            } => (
                "failed",
                *items_synced,
                *items_failed,
                Some(error_message.as_str()),
            ),
        };

        let row = sqlx::query(&format!(
            "update sync_runs
             set status = $2, ended_at = $3, items_synced = $4, items_failed = $5, error_message = $6
             where run_id = $1 and status = 'in_progress'
             returning {RUN_COLUMNS}"
        ))
        .bind(run_id)
        .bind(status)
        .bind(Utc::now())
        .bind(items_synced)
        .bind(items_failed)
        .bind(error_message)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MirrorError::Database(e.to_string()))?;

        match row {
            Some(r) => Self::map_run(r),
            None => match self.get_run(run_id).await? {
                Some(existing) => Err(MirrorError::Validation(format!(
                    "run {run_id} is already {}",
                    existing.state.status()
                ))),
                None => Err(MirrorError::NotFound(format!("sync run {run_id}"))),
            },
        }
    }

    async fn get_run(&self, run_id: &str) -> MirrorResult<Option<SyncRun>> {
        let row = sqlx::query(&format!(
            "select {RUN_COLUMNS} from sync_runs where run_id = $1"
        ))
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MirrorError::Database(e.to_string()))?;

        row.map(Self::map_run).transpose()
    }

    async fn list_runs(&self, limit: i64) -> MirrorResult<Vec<SyncRun>> {
        let rows = sqlx::query(&format!(
            "select {RUN_COLUMNS} from sync_runs
             order by started_at desc, run_id desc
             limit $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MirrorError::Database(e.to_string()))?;

        rows.into_iter().map(Self::map_run).collect()
    }
}

#[async_trait]
impl SyncWatermarkRepository for PgSyncRepository {
    async fn get_watermark(&self, entity_type: EntityType) -> MirrorResult<Option<SyncWatermark>> {
        let row = sqlx::query(&format!(
            "select {WATERMARK_COLUMNS} from sync_watermarks where entity_type = $1"
        ))
        .bind(entity_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MirrorError::Database(e.to_string()))?;

        row.map(Self::map_watermark).transpose()
    }

    async fn record_success(
        &self,
        entity_type: EntityType,
        synced_at: DateTime<Utc>,
        total_available: i64,
        total_synced: i64,
    ) -> MirrorResult<SyncWatermark> {
        let row = sqlx::query(&format!(
            "insert into sync_watermarks (entity_type, last_sync_at, total_available, total_synced, updated_at)
             values ($1, $2, $3, $4, now())
             on conflict (entity_type) do update set
               last_sync_at = excluded.last_sync_at,
               total_available = excluded.total_available,
               total_synced = excluded.total_synced,
               updated_at = now()
             returning {WATERMARK_COLUMNS}"
        ))
        .bind(entity_type.as_str())
        .bind(synced_at)
        .bind(total_available)
        .bind(total_synced)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| MirrorError::Database(e.to_string()))?;

        Self::map_watermark(row)
    }

    async fn list_watermarks(&self) -> MirrorResult<Vec<SyncWatermark>> {
        let rows = sqlx::query(&format!(
            "select {WATERMARK_COLUMNS} from sync_watermarks order by entity_type"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MirrorError::Database(e.to_string()))?;

        rows.into_iter().map(Self::map_watermark).collect()
    }
}
