use pickmirror_common::error::{MirrorError, MirrorResult};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> MirrorResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            host: get_var_or("HOST", "0.0.0.0"),
            port: parse_var_or("PORT", 8080)?,
            log_level: get_var_or("LOG_LEVEL", "info"),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Connection and throttling settings for the remote warehouse API.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteApiConfig {
    pub base_url: String,
    pub api_token: String,
    pub requests_per_minute: u32,
    pub rate_limit_cooldown_secs: u64,
    pub max_rate_limit_retries: u32,
    pub max_attempts: u32,
    pub page_size: usize,
    pub timeout_secs: u64,
}

impl RemoteApiConfig {
    /// Load the remote API config from environment.
    ///
    /// Returns `Ok(None)` if the remote API is not configured (base URL or token missing).
    /// Returns `Err` if it IS configured but a tuning knob is unparsable or zero.
    pub fn from_env() -> MirrorResult<Option<Self>> {
        let _ = dotenvy::dotenv();

        let base_url = match env::var("WMS_API_BASE_URL").ok() {
            Some(v) => v.trim_end_matches('/').to_string(),
            None => return Ok(None),
        };
        let api_token = match env::var("WMS_API_TOKEN").ok() {
            Some(v) => v,
            None => return Ok(None),
        };

        let config = Self {
            base_url,
            api_token,
            requests_per_minute: parse_var_or("WMS_REQUESTS_PER_MINUTE", 30)?,
            rate_limit_cooldown_secs: parse_var_or("WMS_RATE_LIMIT_COOLDOWN_SECS", 20)?,
            max_rate_limit_retries: parse_var_or("WMS_MAX_RATE_LIMIT_RETRIES", 3)?,
            max_attempts: parse_var_or("WMS_MAX_ATTEMPTS", 4)?,
            page_size: parse_var_or("WMS_PAGE_SIZE", 100)?,
            timeout_secs: parse_var_or("WMS_TIMEOUT_SECS", 30)?,
        };
        config.validate()?;
        Ok(Some(config))
    }

    pub fn validate(&self) -> MirrorResult<()> {
        if self.requests_per_minute == 0 {
            return Err(MirrorError::Config(
                "WMS_REQUESTS_PER_MINUTE must be greater than zero".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(MirrorError::Config(
                "WMS_PAGE_SIZE must be greater than zero".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(MirrorError::Config(
                "WMS_MAX_ATTEMPTS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub upsert_batch_size: usize,
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            upsert_batch_size: 50,
            interval_secs: 900,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> MirrorResult<Self> {
        let defaults = Self::default();
        let upsert_batch_size =
            parse_var_or("SYNC_UPSERT_BATCH_SIZE", defaults.upsert_batch_size)?;
        if upsert_batch_size == 0 {
            return Err(MirrorError::Config(
                "SYNC_UPSERT_BATCH_SIZE must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            upsert_batch_size,
            interval_secs: parse_var_or("SYNC_INTERVAL_SECS", defaults.interval_secs)?,
        })
    }
}

fn get_var(key: &str) -> MirrorResult<String> {
    env::var(key).map_err(|_| MirrorError::Config(format!("{key} is required but not set")))
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_var_or<T>(key: &str, default: T) -> MirrorResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| MirrorError::Config(format!("invalid {key}: {e}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const REMOTE_VARS: [&str; 8] = [
        "WMS_API_BASE_URL",
        "WMS_API_TOKEN",
        "WMS_REQUESTS_PER_MINUTE",
        "WMS_RATE_LIMIT_COOLDOWN_SECS",
        "WMS_MAX_RATE_LIMIT_RETRIES",
        "WMS_MAX_ATTEMPTS",
        "WMS_PAGE_SIZE",
        "WMS_TIMEOUT_SECS",
    ];

    fn clear_remote_vars() {
        for key in REMOTE_VARS {
            env::remove_var(key);
        }
    }

    #[test]
    fn config_from_env_succeeds_with_required_vars() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::set_var("DATABASE_URL", "postgres://localhost/pickmirror_test");
        env::remove_var("PORT");

        let cfg = AppConfig::from_env().expect("should parse config");
        assert_eq!(cfg.database_url, "postgres://localhost/pickmirror_test");
        assert_eq!(cfg.port, 8080);

        env::remove_var("DATABASE_URL");
    }

    #[test]
    fn config_from_env_fails_without_database_url() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::remove_var("DATABASE_URL");
        let result = AppConfig::from_env();
        assert!(result.is_err());
    }

    #[test]
    fn config_from_env_rejects_bad_port() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::set_var("DATABASE_URL", "postgres://localhost/pickmirror_test");
        env::set_var("PORT", "eighty");
        let err = AppConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("PORT"));

        env::remove_var("PORT");
        env::remove_var("DATABASE_URL");
    }

    #[test]
    fn bind_addr_formats_correctly() {
        let cfg = AppConfig {
            database_url: String::new(),
            host: "127.0.0.1".to_owned(),
            port: 3000,
            log_level: "debug".to_owned(),
        };
        assert_eq!(cfg.bind_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn remote_config_absent_without_credentials() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear_remote_vars();

        env::set_var("WMS_API_BASE_URL", "https://wms.example.com/api/v1");
        let cfg = RemoteApiConfig::from_env().expect("should not error");
        assert!(cfg.is_none());

        clear_remote_vars();
    }

    #[test]
    fn remote_config_defaults() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear_remote_vars();

        env::set_var("WMS_API_BASE_URL", "https://wms.example.com/api/v1/");
        env::set_var("WMS_API_TOKEN", "secret");
        let cfg = RemoteApiConfig::from_env()
            .expect("should parse")
            .expect("should be configured");
        assert_eq!(cfg.base_url, "https://wms.example.com/api/v1");
        assert_eq!(cfg.requests_per_minute, 30);
        assert_eq!(cfg.rate_limit_cooldown_secs, 20);
        assert_eq!(cfg.max_rate_limit_retries, 3);
        assert_eq!(cfg.max_attempts, 4);
        assert_eq!(cfg.page_size, 100);

        clear_remote_vars();
    }

    #[test]
    fn remote_config_rejects_zero_rate() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        clear_remote_vars();

        env::set_var("WMS_API_BASE_URL", "https://wms.example.com");
        env::set_var("WMS_API_TOKEN", "secret");
        env::set_var("WMS_REQUESTS_PER_MINUTE", "0");
        assert!(RemoteApiConfig::from_env().is_err());

        clear_remote_vars();
    }

    #[test]
    fn sync_config_rejects_zero_batch_size() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::set_var("SYNC_UPSERT_BATCH_SIZE", "0");
        assert!(SyncConfig::from_env().is_err());
        env::set_var("SYNC_UPSERT_BATCH_SIZE", "25");
        assert_eq!(SyncConfig::from_env().unwrap().upsert_batch_size, 25);

        env::remove_var("SYNC_UPSERT_BATCH_SIZE");
    }
}
