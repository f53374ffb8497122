use chrono::{DateTime, Utc};
use pickmirror_common::entity::EntityType;
use pickmirror_common::schema::EntityRow;
use pickmirror_db::entity::models::TableSpec;
use pickmirror_db::entity::repositories::EntityRepository;
use pickmirror_db::sync::repositories::{SyncRunRepository, SyncWatermarkRepository};
use serde::Serialize;
use tracing::Instrument;

use crate::client::{RateLimitedClient, SinceFilter};
use crate::descriptor::{descriptor_for, SchemaDescriptor};
use crate::error::SyncError;
use crate::mapper::extract;
use crate::progress::{ProgressTracker, RunTally};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    /// `None` when the run could not even be recorded.
    pub run_id: Option<String>,
    pub entity_type: EntityType,
    pub success: bool,
    pub items_synced: usize,
    pub items_failed: usize,
    pub error: Option<String>,
}

/// Runs one entity type through fetch → map → upsert → record.
pub struct EntitySyncOrchestrator<E, R, W> {
    client: RateLimitedClient,
    entities: E,
    progress: ProgressTracker<R, W>,
    batch_size: usize,
}

impl<E, R, W> EntitySyncOrchestrator<E, R, W>
where
    E: EntityRepository,
    R: SyncRunRepository,
    W: SyncWatermarkRepository,
{
    pub fn new(
        client: RateLimitedClient,
        entities: E,
        progress: ProgressTracker<R, W>,
        batch_size: usize,
    ) -> Self {
        Self {
            client,
            entities,
            progress,
            batch_size: batch_size.max(1),
        }
    }

    /// Sync one entity type. Always returns a result; every recorded run
    /// ends `completed` or `failed`.
    pub async fn sync(&self, entity_type: EntityType, full: bool) -> SyncResult {
        let run = match self.progress.start(entity_type).await {
            Ok(run) => run,
            Err(e) => {
                tracing::error!(entity = %entity_type, error = %e, "could not record sync run");
                return SyncResult {
                    run_id: None,
                    entity_type,
                    success: false,
                    items_synced: 0,
                    items_failed: 0,
                    error: Some(e.to_string()),
                };
            }
        };

        let run_id = run.run_id().to_string();
        let span = tracing::info_span!("entity_sync", entity = %entity_type, run_id = %run_id, full);

        async move {
            let mut tally = RunTally::default();
            let descriptor = descriptor_for(entity_type);

            let (success, error) = match self.run_pass(descriptor, full, &mut tally).await {
                Ok(()) => match self.progress.complete(run, tally).await {
                    Ok(_) => (true, None),
                    Err(e) => {
                        tracing::error!(error = %e, "could not record completion");
                        (false, Some(e.to_string()))
                    }
                },
                Err(e) => {
                    let message = e.to_string();
                    if let Err(mark) = self.progress.fail(run, tally, &message).await {
                        tracing::error!(error = %mark, "could not record failure");
                    }
                    (false, Some(message))
                }
            };

            SyncResult {
                run_id: Some(run_id),
                entity_type,
                success,
                items_synced: tally.written,
                items_failed: tally.failed,
                error,
            }
        }
        .instrument(span)
        .await
    }

    async fn run_pass(
        &self,
        descriptor: &SchemaDescriptor,
        full: bool,
        tally: &mut RunTally,
    ) -> Result<(), SyncError> {
        let table = descriptor.table_spec();
        let change = self
            .entities
            .ensure_table(&table)
            .await
            .map_err(|e| SyncError::Schema(e.to_string()))?;
        if !change.is_noop() {
            tracing::info!(?change, "entity table reconciled");
        }

        let lower_bound = self
            .progress
            .lower_bound(descriptor.entity_type, full)
            .await?;
        let since = since_filter(descriptor, lower_bound);

        let page_size = self.client.page_size();
        let mut offset = 0;

        loop {
            let page = self
                .client
                .fetch_page(descriptor.endpoint, offset, page_size, since)
                .await?;
            tally.fetched += page.items.len();

            let mut rows = Vec::with_capacity(page.items.len());
            for raw in &page.items {
                match extract(raw, descriptor) {
                    Ok(row) => rows.push(row),
                    Err(e) => {
                        let err = SyncError::from(e);
                        tracing::warn!(error = %err, "skipping record");
                        tally.failed += 1;
                    }
                }
            }

            self.write_rows(&table, &rows, tally).await;

            if !page.has_more {
                break;
            }
            offset += page.items.len();
        }

        tracing::info!(
            fetched = tally.fetched,
            written = tally.written,
            failed = tally.failed,
            "pass finished"
        );
        Ok(())
    }

    /// Write in fixed-size transactional batches. A batch that cannot be
    /// committed counts all of its rows as failed; later batches still run.
    async fn write_rows(&self, table: &TableSpec, rows: &[EntityRow], tally: &mut RunTally) {
        for batch in rows.chunks(self.batch_size) {
            match self.entities.upsert_batch(table, batch).await {
                Ok(outcome) => {
                    tally.written += outcome.written;
                    tally.failed += outcome.failed;
                }
                Err(e) => {
                    let err = SyncError::Upsert(e.to_string());
                    tracing::warn!(error = %err, rows = batch.len(), "batch rolled back");
                    tally.failed += batch.len();
                }
            }
        }
    }
}

fn since_filter(
    descriptor: &SchemaDescriptor,
    lower_bound: DateTime<Utc>,
) -> Option<SinceFilter<'static>> {
    match descriptor.since_param {
        Some(param) if lower_bound > DateTime::UNIX_EPOCH => Some(SinceFilter {
            param,
            since: lower_bound,
        }),
        _ => None,
    }
}
