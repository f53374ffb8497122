use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use pickmirror_common::entity::EntityType;
use pickmirror_common::error::MirrorError;
use pickmirror_engine::{EntityStats, PgCoordinator, SyncLaunch};

use crate::error::ApiError;
use crate::sync::requests::{HistoryQuery, SyncRequest};
use crate::sync::responses::{HistoryResponse, TriggerResponse};
use crate::AppState;

fn coordinator(state: &AppState) -> Result<&PgCoordinator, ApiError> {
    state
        .coordinator
        .as_ref()
        .ok_or_else(|| MirrorError::Config("remote API is not configured".to_string()).into())
}

/// Respond as soon as the tasks are spawned; they finish in the background.
fn accepted(launch: SyncLaunch) -> Json<TriggerResponse> {
    tracing::info!(tasks = launch.task_count(), message = %launch.message, "sync triggered");
    Json(TriggerResponse {
        success: true,
        message: launch.message,
    })
}

pub async fn sync_all(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TriggerResponse>, ApiError> {
    let request = SyncRequest::from_body(&body)?;
    let coordinator = coordinator(&state)?;
    Ok(accepted(coordinator.sync_all(request.full)))
}

pub async fn sync_entity(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
    body: Bytes,
) -> Result<Json<TriggerResponse>, ApiError> {
    let request = SyncRequest::from_body(&body)?;
    let coordinator = coordinator(&state)?;
    Ok(accepted(coordinator.sync_one(&entity_type, request.full)?))
}

pub async fn retry_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<TriggerResponse>, ApiError> {
    let coordinator = coordinator(&state)?;
    Ok(accepted(coordinator.retry(&run_id)?))
}

pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<EntityType, EntityStats>>, ApiError> {
    Ok(Json(state.reader.get_stats().await?))
}

pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let data = state.reader.get_history(query.effective_limit()).await?;
    let count = data.len();
    Ok(Json(HistoryResponse { data, count }))
}
