use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use pickmirror_common::entity::EntityType;
use pickmirror_db::entity::repositories::EntityRepository;
use pickmirror_db::sync::models::SyncRun;
use pickmirror_db::sync::repositories::{SyncRunRepository, SyncWatermarkRepository};
use serde::Serialize;

use crate::descriptor::descriptor_for;
use crate::error::SyncError;
use crate::progress::ProgressTracker;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityStats {
    /// Rows currently mirrored; 0 before the first sync creates the table.
    pub total_count: i64,
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Rows written by the last successful pass.
    pub last_run_count: Option<i64>,
}

/// Read side of the engine: what the dashboard shows. Needs only the
/// database, so it works whether or not the remote API is configured.
#[derive(Clone)]
pub struct SyncReader<E, R, W> {
    entities: E,
    progress: ProgressTracker<R, W>,
}

impl<E, R, W> SyncReader<E, R, W>
where
    E: EntityRepository,
    R: SyncRunRepository,
    W: SyncWatermarkRepository,
{
    pub fn new(entities: E, progress: ProgressTracker<R, W>) -> Self {
        Self { entities, progress }
    }

    /// Per-entity counts and watermarks for every supported entity type.
    pub async fn get_stats(&self) -> Result<BTreeMap<EntityType, EntityStats>, SyncError> {
        let watermarks: BTreeMap<EntityType, _> = self
            .progress
            .watermarks()
            .await?
            .into_iter()
            .map(|w| (w.entity_type, w))
            .collect();

        let mut stats = BTreeMap::new();
        for entity in EntityType::ALL {
            let total_count = self
                .entities
                .count_rows(descriptor_for(entity).table)
                .await?;
            let watermark = watermarks.get(&entity);
            stats.insert(
                entity,
                EntityStats {
                    total_count,
                    last_sync_at: watermark.map(|w| w.last_sync_at),
                    last_run_count: watermark.and_then(|w| w.total_synced),
                },
            );
        }
        Ok(stats)
    }

    /// Runs newest first.
    pub async fn get_history(&self, limit: i64) -> Result<Vec<SyncRun>, SyncError> {
        Ok(self.progress.history(limit).await?)
    }
}
