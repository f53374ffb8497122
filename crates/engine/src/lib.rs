//! Entity synchronization engine.
//!
//! Pages collections out of the remote warehouse API under a shared rate
//! gate, projects each record through a declarative [`descriptor`], upserts
//! it into a per-entity table and tracks every run in the progress tables.
//!
//! ```ignore
//! let coordinator = pickmirror_engine::build_pg_coordinator(pool, remote, &sync)?;
//! let launch = coordinator.sync_all(false);
//! for result in launch.wait().await {
//!     tracing::info!(?result, "entity sync finished");
//! }
//! ```

pub mod client;
pub mod coordinator;
pub mod descriptor;
pub mod error;
pub mod gate;
pub mod mapper;
pub mod orchestrator;
pub mod progress;
pub mod stats;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use pickmirror_config::{RemoteApiConfig, SyncConfig};
use pickmirror_db::entity::pg_repository::PgEntityRepository;
use pickmirror_db::sync::pg_repository::PgSyncRepository;
use sqlx::PgPool;

pub use client::{ClientError, Page, RateLimitedClient};
pub use coordinator::{parse_run_id, SyncCoordinator, SyncLaunch};
pub use error::SyncError;
pub use gate::{GovernorGate, PauseReason, RateGate};
pub use orchestrator::{EntitySyncOrchestrator, SyncResult};
pub use progress::{ActiveRun, ProgressTracker};
pub use stats::{EntityStats, SyncReader};

pub type PgProgressTracker = ProgressTracker<PgSyncRepository, PgSyncRepository>;
pub type PgOrchestrator =
    EntitySyncOrchestrator<PgEntityRepository, PgSyncRepository, PgSyncRepository>;
pub type PgCoordinator = SyncCoordinator<PgEntityRepository, PgSyncRepository, PgSyncRepository>;
pub type PgSyncReader = SyncReader<PgEntityRepository, PgSyncRepository, PgSyncRepository>;

/// Progress tracker over the Postgres run and watermark tables.
pub fn pg_progress_tracker(pool: PgPool) -> PgProgressTracker {
    let repo = PgSyncRepository::new(pool);
    ProgressTracker::new(repo.clone(), repo)
}

/// Stats and history over Postgres; usable without the remote API.
pub fn pg_sync_reader(pool: PgPool) -> PgSyncReader {
    SyncReader::new(PgEntityRepository::new(pool.clone()), pg_progress_tracker(pool))
}

/// Wire a coordinator against Postgres and the live remote API.
pub fn build_pg_coordinator(
    pool: PgPool,
    remote: RemoteApiConfig,
    sync: &SyncConfig,
) -> Result<PgCoordinator, SyncError> {
    let client = RateLimitedClient::new(remote)?;
    let orchestrator = EntitySyncOrchestrator::new(
        client,
        PgEntityRepository::new(pool.clone()),
        pg_progress_tracker(pool),
        sync.upsert_batch_size,
    );
    Ok(SyncCoordinator::new(Arc::new(orchestrator)))
}
