use tracing_subscriber::{fmt, EnvFilter};

/// Directives appended to the fallback filter so per-query and per-connection
/// chatter from the database and HTTP stacks stays out of sync logs.
const QUIET_DEPENDENCIES: &str = "sqlx=warn,hyper=warn,reqwest=warn";

/// Initialize the tracing subscriber with env-based filtering.
///
/// Reads `RUST_LOG` (or `LOG_LEVEL`) to set the filter.
/// Falls back to `default_level` with noisy dependencies turned down.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new(fallback_directives(default_level)));

    // A second call (tests, embedded use) keeps the first subscriber.
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}

fn fallback_directives(default_level: &str) -> String {
    format!("{default_level},{QUIET_DEPENDENCIES}")
}
