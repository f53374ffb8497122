use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::sync::models::{RunOutcome, SyncRun, SyncWatermark};
use pickmirror_common::entity::EntityType;
use pickmirror_common::error::MirrorResult;

#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    /// Insert a new run in the `in_progress` state.
    /// Fails with `Validation` if `run_id` is already taken.
    async fn create_run(
        &self,
        run_id: &str,
        entity_type: EntityType,
        started_at: DateTime<Utc>,
    ) -> MirrorResult<SyncRun>;

    /// Move an `in_progress` run to its terminal state.
    /// Fails with `Validation` if the run is already terminal.
    async fn finish_run(&self, run_id: &str, outcome: RunOutcome) -> MirrorResult<SyncRun>;

    async fn get_run(&self, run_id: &str) -> MirrorResult<Option<SyncRun>>;

    /// Runs newest first.
    async fn list_runs(&self, limit: i64) -> MirrorResult<Vec<SyncRun>>;
}

#[async_trait]
pub trait SyncWatermarkRepository: Send + Sync {
    async fn get_watermark(&self, entity_type: EntityType) -> MirrorResult<Option<SyncWatermark>>;

    /// Record a successful pass, creating the watermark row if needed.
    async fn record_success(
        &self,
        entity_type: EntityType,
        synced_at: DateTime<Utc>,
        total_available: i64,
        total_synced: i64,
    ) -> MirrorResult<SyncWatermark>;

    async fn list_watermarks(&self) -> MirrorResult<Vec<SyncWatermark>>;
}
