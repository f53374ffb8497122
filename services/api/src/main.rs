mod error;
mod sync;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use pickmirror_common::types::ServiceInfo;
use pickmirror_config::{init_tracing, AppConfig, RemoteApiConfig, SyncConfig};
use pickmirror_engine::{build_pg_coordinator, pg_sync_reader, PgCoordinator, PgSyncReader};
use sqlx::PgPool;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub reader: PgSyncReader,
    /// `None` when the remote API is not configured; read routes still work.
    pub coordinator: Option<PgCoordinator>,
}

impl AppState {
    fn new(pool: PgPool, coordinator: Option<PgCoordinator>) -> Self {
        Self {
            reader: pg_sync_reader(pool),
            coordinator,
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn info() -> Json<ServiceInfo> {
    Json(ServiceInfo::new("pickmirror-api"))
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        .merge(sync::router())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    init_tracing("info");

    let config = AppConfig::from_env().expect("failed to load config");
    let remote = RemoteApiConfig::from_env().expect("invalid remote API config");
    let sync_config = SyncConfig::from_env().expect("invalid sync config");
    tracing::info!(service = "pickmirror-api", "starting");

    let pool = pickmirror_db::create_pool(&config.database_url)
        .await
        .expect("failed to create database pool");
    pickmirror_db::run_migrations(&pool)
        .await
        .expect("failed to run migrations");

    let coordinator = match remote {
        Some(remote) => {
            tracing::info!(base_url = %remote.base_url, "remote API configured");
            Some(
                build_pg_coordinator(pool.clone(), remote, &sync_config)
                    .expect("failed to build sync coordinator"),
            )
        }
        None => {
            tracing::warn!("WMS_API_BASE_URL / WMS_API_TOKEN not set, sync triggers disabled");
            None
        }
    };

    let app = build_router(AppState::new(pool, coordinator));
    let addr: SocketAddr = config.bind_addr().parse().expect("invalid bind address");

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
