//! In-memory doubles shared by the engine's unit tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pickmirror_common::entity::EntityType;
use pickmirror_common::error::{MirrorError, MirrorResult};
use pickmirror_common::schema::EntityRow;
use pickmirror_config::RemoteApiConfig;
use pickmirror_db::entity::models::{BatchOutcome, SchemaChange, TableSpec};
use pickmirror_db::entity::repositories::EntityRepository;
use pickmirror_db::sync::models::{RunOutcome, RunState, SyncRun, SyncWatermark};
use pickmirror_db::sync::repositories::{SyncRunRepository, SyncWatermarkRepository};
use serde_json::Value;
use wiremock::MockServer;

use crate::client::RateLimitedClient;
use crate::gate::{PauseReason, RateGate};
use crate::orchestrator::EntitySyncOrchestrator;
use crate::progress::ProgressTracker;

pub fn remote_config(base_url: &str) -> RemoteApiConfig {
    RemoteApiConfig {
        base_url: base_url.to_string(),
        api_token: "test-token".to_string(),
        requests_per_minute: 30,
        rate_limit_cooldown_secs: 20,
        max_rate_limit_retries: 3,
        max_attempts: 4,
        page_size: 100,
        timeout_secs: 5,
    }
}

pub type TestOrchestrator =
    EntitySyncOrchestrator<InMemoryEntityRepo, InMemorySyncRepo, InMemorySyncRepo>;

pub fn orchestrator_with(
    server: &MockServer,
    entities: InMemoryEntityRepo,
    sync_repo: InMemorySyncRepo,
) -> TestOrchestrator {
    let client = RateLimitedClient::with_gate(
        remote_config(&server.uri()),
        Arc::new(RecordingGate::default()),
    )
    .unwrap();
    EntitySyncOrchestrator::new(
        client,
        entities,
        ProgressTracker::new(sync_repo.clone(), sync_repo),
        50,
    )
}

/// `count` valid remote records for `entity`, keyed from `start`.
pub fn records(entity: EntityType, start: usize, count: usize) -> Vec<Value> {
    (start..start + count)
        .map(|i| match entity {
            EntityType::Products => serde_json::json!({
                "idproduct": i,
                "productcode": format!("SKU-{i}"),
                "name": format!("Product {i}"),
                "price": "12.50",
                "active": true,
                "updated": "2024-03-01 10:00:00",
            }),
            EntityType::Picklists => serde_json::json!({
                "idpicklist": i,
                "picklistid": format!("2024-{i:05}"),
                "status": "new",
                "picker": { "name": "Sam" },
            }),
            EntityType::Warehouses => serde_json::json!({
                "idwarehouse": i,
                "name": format!("Warehouse {i}"),
                "active": 1,
            }),
            EntityType::Users => serde_json::json!({
                "iduser": i,
                "username": format!("user{i}"),
                "admin": false,
            }),
            EntityType::Suppliers => serde_json::json!({
                "idsupplier": i,
                "name": format!("Supplier {i}"),
                "address": { "city": "Utrecht", "country": "NL" },
            }),
            EntityType::Batches => serde_json::json!({
                "idpicklist_batch": i,
                "picklist_batchid": format!("B-{i}"),
                "total_picklists": 4,
            }),
        })
        .collect()
}

/// Gate that never waits; records every call instead.
#[derive(Default)]
pub struct RecordingGate {
    acquires: AtomicUsize,
    pauses: Mutex<Vec<(PauseReason, Duration)>>,
}

impl RecordingGate {
    pub fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn pauses(&self) -> Vec<(PauseReason, Duration)> {
        self.pauses.lock().unwrap().clone()
    }
}

#[async_trait]
impl RateGate for RecordingGate {
    async fn acquire(&self) {
        self.acquires.fetch_add(1, Ordering::SeqCst);
    }

    async fn pause(&self, reason: PauseReason, duration: Duration) {
        self.pauses.lock().unwrap().push((reason, duration));
    }
}

// ── In-memory EntityRepository ─────────────────────────────

#[derive(Default)]
struct EntityState {
    tables: BTreeMap<String, BTreeMap<String, EntityRow>>,
    fail_ensure: bool,
    rejected: HashSet<(String, String)>,
    failing_batch: Option<usize>,
    batch_calls: usize,
}

#[derive(Clone, Default)]
pub struct InMemoryEntityRepo {
    state: Arc<Mutex<EntityState>>,
}

impl InMemoryEntityRepo {
    pub fn fail_ensure_table(&self) {
        self.state.lock().unwrap().fail_ensure = true;
    }

    /// Rows with this key are refused one by one, like a constraint violation.
    pub fn reject_key(&self, table: &str, key: &str) {
        self.state
            .lock()
            .unwrap()
            .rejected
            .insert((table.to_string(), key.to_string()));
    }

    /// The `n`th call to `upsert_batch` (1-based) fails as a whole.
    pub fn fail_batch_number(&self, n: usize) {
        self.state.lock().unwrap().failing_batch = Some(n);
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .map_or(0, |rows| rows.len())
    }

    pub fn row(&self, table: &str, key: &str) -> Option<EntityRow> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .and_then(|rows| rows.get(key).cloned())
    }
}

#[async_trait]
impl EntityRepository for InMemoryEntityRepo {
    async fn ensure_table(&self, table: &TableSpec) -> MirrorResult<SchemaChange> {
        table.validate()?;
        let mut state = self.state.lock().unwrap();
        if state.fail_ensure {
            return Err(MirrorError::Database(format!(
                "permission denied to create table {}",
                table.name
            )));
        }
        let created = !state.tables.contains_key(&table.name);
        state.tables.entry(table.name.clone()).or_default();
        Ok(SchemaChange {
            created,
            added_columns: Vec::new(),
        })
    }

    async fn upsert_batch(
        &self,
        table: &TableSpec,
        rows: &[EntityRow],
    ) -> MirrorResult<BatchOutcome> {
        let mut state = self.state.lock().unwrap();
        state.batch_calls += 1;
        if state.failing_batch == Some(state.batch_calls) {
            return Err(MirrorError::Database("connection reset".to_string()));
        }

        let mut outcome = BatchOutcome::default();
        for row in rows {
            if state
                .rejected
                .contains(&(table.name.clone(), row.key.clone()))
            {
                outcome.failed += 1;
                continue;
            }
            state
                .tables
                .entry(table.name.clone())
                .or_default()
                .insert(row.key.clone(), row.clone());
            outcome.written += 1;
        }
        Ok(outcome)
    }

    async fn count_rows(&self, table: &str) -> MirrorResult<i64> {
        Ok(self.row_count(table) as i64)
    }
}

// ── In-memory sync progress repositories ───────────────────

#[derive(Default)]
struct SyncState {
    runs: Vec<SyncRun>,
    watermarks: BTreeMap<EntityType, SyncWatermark>,
}

#[derive(Clone, Default)]
pub struct InMemorySyncRepo {
    state: Arc<Mutex<SyncState>>,
}

impl InMemorySyncRepo {
    pub fn watermark(&self, entity_type: EntityType) -> Option<SyncWatermark> {
        self.state
            .lock()
            .unwrap()
            .watermarks
            .get(&entity_type)
            .cloned()
    }

    pub fn run(&self, run_id: &str) -> Option<SyncRun> {
        self.state
            .lock()
            .unwrap()
            .runs
            .iter()
            .find(|r| r.run_id == run_id)
            .cloned()
    }

    /// Runs in creation order.
    pub fn runs(&self) -> Vec<SyncRun> {
        self.state.lock().unwrap().runs.clone()
    }

    pub fn seed_watermark(&self, entity_type: EntityType, last_sync_at: DateTime<Utc>) {
        self.state.lock().unwrap().watermarks.insert(
            entity_type,
            SyncWatermark {
                entity_type,
                last_sync_at,
                total_available: None,
                total_synced: None,
                updated_at: last_sync_at,
            },
        );
    }
}

#[async_trait]
impl SyncRunRepository for InMemorySyncRepo {
    async fn create_run(
        &self,
        run_id: &str,
        entity_type: EntityType,
        started_at: DateTime<Utc>,
    ) -> MirrorResult<SyncRun> {
        let mut state = self.state.lock().unwrap();
        if state.runs.iter().any(|r| r.run_id == run_id) {
            return Err(MirrorError::Validation(format!(
                "sync run {run_id} already exists"
            )));
        }
        let run = SyncRun {
            run_id: run_id.to_string(),
            entity_type,
            started_at,
            ended_at: None,
            state: RunState::InProgress,
        };
        state.runs.push(run.clone());
        Ok(run)
    }

    async fn finish_run(&self, run_id: &str, outcome: RunOutcome) -> MirrorResult<SyncRun> {
        let mut state = self.state.lock().unwrap();
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.run_id == run_id)
            .ok_or_else(|| MirrorError::NotFound(format!("sync run {run_id}")))?;
        if run.state.is_terminal() {
            return Err(MirrorError::Validation(format!(
                "sync run {run_id} is already {}",
                run.state.status()
            )));
        }
        run.state = outcome.into_state();
        run.ended_at = Some(Utc::now());
        Ok(run.clone())
    }

    async fn get_run(&self, run_id: &str) -> MirrorResult<Option<SyncRun>> {
        Ok(self.run(run_id))
    }

    async fn list_runs(&self, limit: i64) -> MirrorResult<Vec<SyncRun>> {
        let mut runs = self.runs();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit.max(0) as usize);
        Ok(runs)
    }
}

#[async_trait]
impl SyncWatermarkRepository for InMemorySyncRepo {
    async fn get_watermark(&self, entity_type: EntityType) -> MirrorResult<Option<SyncWatermark>> {
        Ok(self.watermark(entity_type))
    }

    async fn record_success(
        &self,
        entity_type: EntityType,
        synced_at: DateTime<Utc>,
        total_available: i64,
        total_synced: i64,
    ) -> MirrorResult<SyncWatermark> {
        let watermark = SyncWatermark {
            entity_type,
            last_sync_at: synced_at,
            total_available: Some(total_available),
            total_synced: Some(total_synced),
            updated_at: Utc::now(),
        };
        self.state
            .lock()
            .unwrap()
            .watermarks
            .insert(entity_type, watermark.clone());
        Ok(watermark)
    }

    async fn list_watermarks(&self) -> MirrorResult<Vec<SyncWatermark>> {
        Ok(self.state.lock().unwrap().watermarks.values().cloned().collect())
    }
}
