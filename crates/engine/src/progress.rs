use chrono::{DateTime, TimeDelta, Utc};
use pickmirror_common::entity::EntityType;
use pickmirror_common::error::{MirrorError, MirrorResult};
use pickmirror_db::sync::models::{RunOutcome, SyncRun, SyncWatermark};
use pickmirror_db::sync::repositories::{SyncRunRepository, SyncWatermarkRepository};

const MAX_RUN_ID_ATTEMPTS: u32 = 5;

/// Counters accumulated over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTally {
    /// Records received from the remote API.
    pub fetched: usize,
    /// Rows written to the entity table.
    pub written: usize,
    /// Records skipped by mapping or rejected by the store.
    pub failed: usize,
}

/// A run that has been recorded as `in_progress`.
///
/// Not `Clone`: finishing consumes it, so a run can reach exactly one
/// terminal state.
#[derive(Debug)]
pub struct ActiveRun {
    run_id: String,
    entity_type: EntityType,
    started_at: DateTime<Utc>,
}

impl ActiveRun {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// `{entity_type}_{epoch_ms}`
pub fn make_run_id(entity_type: EntityType, at: DateTime<Utc>) -> String {
    format!("{}_{}", entity_type, at.timestamp_millis())
}

#[derive(Clone)]
pub struct ProgressTracker<R, W> {
    runs: R,
    watermarks: W,
}

impl<R, W> ProgressTracker<R, W>
where
    R: SyncRunRepository,
    W: SyncWatermarkRepository,
{
    pub fn new(runs: R, watermarks: W) -> Self {
        Self { runs, watermarks }
    }

    pub async fn start(&self, entity_type: EntityType) -> MirrorResult<ActiveRun> {
        self.start_at(entity_type, Utc::now()).await
    }

    /// Record a run started at `at`. If another run of the same entity
    /// already holds that millisecond, move on to the next one.
    async fn start_at(&self, entity_type: EntityType, at: DateTime<Utc>) -> MirrorResult<ActiveRun> {
        let mut started_at = at;
        for _ in 0..MAX_RUN_ID_ATTEMPTS {
            let run_id = make_run_id(entity_type, started_at);
            match self.runs.create_run(&run_id, entity_type, started_at).await {
                Ok(_) => {
                    tracing::info!(%run_id, entity = %entity_type, "sync run started");
                    return Ok(ActiveRun {
                        run_id,
                        entity_type,
                        started_at,
                    });
                }
                Err(MirrorError::Validation(e)) => {
                    tracing::warn!(%run_id, entity = %entity_type, error = %e, "run id taken, retrying");
                    started_at += TimeDelta::milliseconds(1);
                }
                Err(e) => return Err(e),
            }
        }
        Err(MirrorError::Internal(format!(
            "no free run id for {entity_type} after {MAX_RUN_ID_ATTEMPTS} attempts"
        )))
    }

    /// Epoch zero for full passes and for entities never synced before.
    pub async fn lower_bound(
        &self,
        entity_type: EntityType,
        full: bool,
    ) -> MirrorResult<DateTime<Utc>> {
        if full {
            return Ok(DateTime::UNIX_EPOCH);
        }
        Ok(self
            .watermarks
            .get_watermark(entity_type)
            .await?
            .map(|w| w.last_sync_at)
            .unwrap_or(DateTime::UNIX_EPOCH))
    }

    /// Advance the watermark to the run's start, then mark the run completed.
    /// If the watermark cannot be written the run is marked failed instead.
    ///
    /// Records changed remotely while the pass was paging fall after the
    /// run's start, so the next incremental pass asks for them again.
    pub async fn complete(&self, run: ActiveRun, tally: RunTally) -> MirrorResult<SyncRun> {
        if let Err(e) = self
            .watermarks
            .record_success(
                run.entity_type,
                run.started_at,
                tally.fetched as i64,
                tally.written as i64,
            )
            .await
        {
            let message = format!("failed to advance watermark: {e}");
            self.fail(run, tally, &message).await?;
            return Err(e);
        }

        let finished = self
            .runs
            .finish_run(
                &run.run_id,
                RunOutcome::Completed {
                    items_synced: tally.written as i64,
                    items_failed: tally.failed as i64,
                },
            )
            .await?;
        tracing::info!(
            run_id = %run.run_id,
            items_synced = tally.written,
            items_failed = tally.failed,
            "sync run completed"
        );
        Ok(finished)
    }

    /// Mark the run failed. The watermark is left where it was.
    pub async fn fail(
        &self,
        run: ActiveRun,
        tally: RunTally,
        error_message: &str,
    ) -> MirrorResult<SyncRun> {
        let finished = self
            .runs
            .finish_run(
                &run.run_id,
                RunOutcome::Failed {
                    items_synced: tally.written as i64,
                    items_failed: tally.failed as i64,
                    error_message: error_message.to_string(),
                },
            )
            .await?;
        tracing::error!(run_id = %run.run_id, error = %error_message, "sync run failed");
        Ok(finished)
    }

    pub async fn history(&self, limit: i64) -> MirrorResult<Vec<SyncRun>> {
        self.runs.list_runs(limit).await
    }

    pub async fn watermarks(&self) -> MirrorResult<Vec<SyncWatermark>> {
        self.watermarks.list_watermarks().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemorySyncRepo;
    use pickmirror_db::sync::models::RunState;

    fn tracker() -> (ProgressTracker<InMemorySyncRepo, InMemorySyncRepo>, InMemorySyncRepo) {
        let repo = InMemorySyncRepo::default();
        (ProgressTracker::new(repo.clone(), repo.clone()), repo)
    }

    #[test]
    fn run_id_format() {
        let at = DateTime::from_timestamp_millis(1_699_999_999_999).unwrap();
        assert_eq!(
            make_run_id(EntityType::Products, at),
            "products_1699999999999"
        );
    }

    #[tokio::test]
    async fn lower_bound_defaults_to_epoch() {
        let (tracker, _repo) = tracker();
        let bound = tracker
            .lower_bound(EntityType::Users, false)
            .await
            .unwrap();
        assert_eq!(bound, DateTime::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn completed_run_advances_watermark() {
        let (tracker, repo) = tracker();
        let run = tracker.start(EntityType::Users).await.unwrap();
        let run_id = run.run_id().to_string();

        let finished = tracker
            .complete(
                run,
                RunTally {
                    fetched: 5,
                    written: 4,
                    failed: 1,
                },
            )
            .await
            .unwrap();
        assert_eq!(
            finished.state,
            RunState::Completed {
                items_synced: 4,
                items_failed: 1
            }
        );

        let incremental = tracker
            .lower_bound(EntityType::Users, false)
            .await
            .unwrap();
        assert!(incremental > DateTime::UNIX_EPOCH);
        let full = tracker.lower_bound(EntityType::Users, true).await.unwrap();
        assert_eq!(full, DateTime::UNIX_EPOCH);

        let watermark = repo.watermark(EntityType::Users).unwrap();
        assert_eq!(watermark.last_sync_at, finished.started_at);
        assert_eq!(watermark.total_available, Some(5));
        assert_eq!(watermark.total_synced, Some(4));
        assert_eq!(repo.run(&run_id).unwrap().state.status(), "completed");
    }

    #[tokio::test]
    async fn failed_run_leaves_watermark_alone() {
        let (tracker, repo) = tracker();
        let run = tracker.start(EntityType::Batches).await.unwrap();
        let finished = tracker
            .fail(run, RunTally::default(), "transport error: boom")
            .await
            .unwrap();
        assert_eq!(finished.state.status(), "failed");
        assert!(repo.watermark(EntityType::Batches).is_none());
    }

    #[tokio::test]
    async fn start_skips_a_taken_millisecond() {
        let (tracker, repo) = tracker();
        let at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        repo.create_run("users_1700000000000", EntityType::Users, at)
            .await
            .unwrap();

        let run = tracker.start_at(EntityType::Users, at).await.unwrap();

        assert_eq!(run.run_id(), "users_1700000000001");
        assert_eq!(repo.runs().len(), 2);
        // Another entity in the same millisecond is unaffected.
        let other = tracker.start_at(EntityType::Products, at).await.unwrap();
        assert_eq!(other.run_id(), "products_1700000000000");
    }
}
