//! Fan-out of sync passes onto background tasks.

use std::sync::Arc;

use pickmirror_common::entity::EntityType;
use pickmirror_db::entity::repositories::EntityRepository;
use pickmirror_db::sync::repositories::{SyncRunRepository, SyncWatermarkRepository};
use tokio::task::JoinHandle;

use crate::error::SyncError;
use crate::orchestrator::{EntitySyncOrchestrator, SyncResult};

/// Tasks started by a trigger. Dropping it detaches them; [`SyncLaunch::wait`]
/// collects their results.
#[derive(Debug)]
pub struct SyncLaunch {
    pub message: String,
    handles: Vec<JoinHandle<SyncResult>>,
}

impl SyncLaunch {
    pub fn task_count(&self) -> usize {
        self.handles.len()
    }

    pub async fn wait(self) -> Vec<SyncResult> {
        let mut results = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!(error = %e, "sync task panicked or was cancelled"),
            }
        }
        results
    }
}

pub struct SyncCoordinator<E, R, W> {
    orchestrator: Arc<EntitySyncOrchestrator<E, R, W>>,
}

impl<E, R, W> Clone for SyncCoordinator<E, R, W> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
        }
    }
}

impl<E, R, W> SyncCoordinator<E, R, W>
where
    E: EntityRepository + 'static,
    R: SyncRunRepository + 'static,
    W: SyncWatermarkRepository + 'static,
{
    pub fn new(orchestrator: Arc<EntitySyncOrchestrator<E, R, W>>) -> Self {
        Self { orchestrator }
    }

    /// One concurrent pass per entity type. Throughput is still bounded by
    /// the shared rate gate.
    pub fn sync_all(&self, full: bool) -> SyncLaunch {
        let handles = EntityType::ALL
            .into_iter()
            .map(|entity| self.spawn(entity, full))
            .collect();
        tracing::info!(full, "sync of all entity types started");
        SyncLaunch {
            message: format!(
                "Sync started for all entity types ({})",
                mode_label(full)
            ),
            handles,
        }
    }

    pub fn sync_entity(&self, entity_type: EntityType, full: bool) -> SyncLaunch {
        let handle = self.spawn(entity_type, full);
        SyncLaunch {
            message: format!("Sync started for {entity_type} ({})", mode_label(full)),
            handles: vec![handle],
        }
    }

    /// Like [`Self::sync_entity`] but validates a caller-supplied name first.
    pub fn sync_one(&self, entity_type: &str, full: bool) -> Result<SyncLaunch, SyncError> {
        let entity = entity_type
            .parse::<EntityType>()
            .map_err(|_| SyncError::UnknownEntityType(entity_type.to_string()))?;
        Ok(self.sync_entity(entity, full))
    }

    /// Start a fresh incremental pass for the entity that `run_id` belongs to.
    /// The original run is left untouched.
    pub fn retry(&self, run_id: &str) -> Result<SyncLaunch, SyncError> {
        let entity = parse_run_id(run_id)?;
        let mut launch = self.sync_entity(entity, false);
        launch.message = format!("Retry of {run_id} started for {entity}");
        Ok(launch)
    }

    fn spawn(&self, entity: EntityType, full: bool) -> JoinHandle<SyncResult> {
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move { orchestrator.sync(entity, full).await })
    }
}

fn mode_label(full: bool) -> &'static str {
    if full {
        "full"
    } else {
        "incremental"
    }
}

/// Entity type encoded in a run id: everything before the last `_`.
pub fn parse_run_id(run_id: &str) -> Result<EntityType, SyncError> {
    let (prefix, millis) = run_id
        .rsplit_once('_')
        .ok_or_else(|| SyncError::InvalidRunId(run_id.to_string()))?;
    if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SyncError::InvalidRunId(run_id.to_string()));
    }
    prefix
        .parse::<EntityType>()
        .map_err(|_| SyncError::InvalidRunId(run_id.to_string()))
}
