pub mod handlers;
pub mod requests;
pub mod responses;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sync/all", post(handlers::sync_all))
        .route("/sync/entities/{entity_type}", post(handlers::sync_entity))
        .route("/sync/runs/{run_id}/retry", post(handlers::retry_run))
        .route("/sync/stats", get(handlers::get_stats))
        .route("/sync/history", get(handlers::get_history))
}
