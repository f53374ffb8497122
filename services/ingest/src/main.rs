mod args;

use pickmirror_config::{init_tracing, AppConfig, RemoteApiConfig, SyncConfig};
use pickmirror_engine::build_pg_coordinator;

use crate::args::parse_args;

#[tokio::main]
async fn main() {
    init_tracing("info");

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}\nusage: pickmirror-ingest [entity_type] [--full]");
            std::process::exit(2);
        }
    };
    tracing::info!(service = "pickmirror-ingest", ?args, "starting");

    let config = AppConfig::from_env().expect("failed to load config");
    let sync_config = SyncConfig::from_env().expect("invalid sync config");
    let remote = match RemoteApiConfig::from_env() {
        Ok(Some(remote)) => remote,
        Ok(None) => {
            tracing::error!("WMS_API_BASE_URL and WMS_API_TOKEN must be set");
            std::process::exit(1);
        }
        Err(e) => panic!("remote API configuration error (fail-fast): {e}"),
    };

    let pool = pickmirror_db::create_pool(&config.database_url)
        .await
        .expect("failed to connect to database");
    pickmirror_db::run_migrations(&pool)
        .await
        .expect("failed to run migrations");

    let coordinator =
        build_pg_coordinator(pool, remote, &sync_config).expect("failed to build sync coordinator");

    let launch = match args.entity {
        Some(entity) => coordinator.sync_entity(entity, args.full),
        None => coordinator.sync_all(args.full),
    };
    tracing::info!(message = %launch.message, "waiting for sync tasks");

    let results = launch.wait().await;
    let mut failures = 0;
    for result in &results {
        if result.success {
            tracing::info!(
                entity = %result.entity_type,
                run_id = result.run_id.as_deref().unwrap_or("-"),
                synced = result.items_synced,
                failed = result.items_failed,
                "entity sync completed"
            );
        } else {
            failures += 1;
            tracing::error!(
                entity = %result.entity_type,
                run_id = result.run_id.as_deref().unwrap_or("-"),
                synced = result.items_synced,
                error = result.error.as_deref().unwrap_or("unknown"),
                "entity sync failed"
            );
        }
    }

    tracing::info!(runs = results.len(), failures, "ingest finished");
    if failures > 0 {
        std::process::exit(1);
    }
}
