//! Settings read from the environment.

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use movies_etl_pipeline::RetryPolicy;
use movies_etl_repository::{PostgresConfig, RedisConfig, SearchIndexConfig};

use crate::EtlError;

/// Default Postgres host.
const DEFAULT_DB_HOST: &str = "127.0.0.1";

/// Default Postgres port.
const DEFAULT_DB_PORT: u16 = 5432;

/// Default schema holding the movies tables.
const DEFAULT_POSTGRES_SCHEMA: &str = "content";

/// Default Redis host.
const DEFAULT_REDIS_HOST: &str = "127.0.0.1";

/// Default Redis port.
const DEFAULT_REDIS_PORT: u16 = 6379;

/// Default search cluster host.
const DEFAULT_ELASTIC_HOST: &str = "localhost";

/// Default search cluster port.
const DEFAULT_ELASTIC_PORT: u16 = 9200;

/// Default path of the file state backend.
const DEFAULT_STATE_FILE: &str = "state.json";

/// Largest accepted batch size; also the per-request limit of the index client.
const MAX_BATCH_SIZE: usize = 1000;

/// Where watermarks are kept.
#[derive(Debug, Clone, PartialEq)]
pub enum StateBackend {
    Redis,
    File(PathBuf),
}

/// Validated settings for one ETL process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub postgres: PostgresConfig,
    pub redis: RedisConfig,
    pub search: SearchIndexConfig,
    pub state_backend: StateBackend,
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub retry: RetryPolicy,
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `POSTGRES_DB`, `POSTGRES_USER`, `POSTGRES_PASSWORD`: required
    /// - `DB_HOST`, `DB_PORT`: Postgres address (default: 127.0.0.1:5432)
    /// - `POSTGRES_SCHEMA`: schema of the movies tables (default: content)
    /// - `REDIS_HOST`, `REDIS_PORT`: Redis address (default: 127.0.0.1:6379)
    /// - `OPENSEARCH_URL`: search cluster URL, or `ELASTIC_HOST`/`ELASTIC_PORT`
    ///   (default: http://localhost:9200)
    /// - `ETL_STATE_BACKEND`: `redis` or `file` (default: redis)
    /// - `ETL_STATE_FILE`: path of the file backend (default: state.json)
    /// - `ETL_POLL_INTERVAL_SECS`: pause between passes (default: 60)
    /// - `ETL_BATCH_SIZE`: ids per page and per bulk request (default: 100)
    /// - `BACKOFF_START_MS`, `BACKOFF_FACTOR`, `BACKOFF_BORDER_MS`: retry
    ///   backoff (default: 100, 2, 10000)
    pub fn from_env() -> Result<Self, EtlError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EtlError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let postgres = PostgresConfig {
            host: var("DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
            port: parsed(&var, "DB_PORT", DEFAULT_DB_PORT)?,
            user: required(&var, "POSTGRES_USER")?,
            password: required(&var, "POSTGRES_PASSWORD")?,
            database: required(&var, "POSTGRES_DB")?,
            schema: var("POSTGRES_SCHEMA").unwrap_or_else(|| DEFAULT_POSTGRES_SCHEMA.to_string()),
        };

        let redis = RedisConfig {
            host: var("REDIS_HOST").unwrap_or_else(|| DEFAULT_REDIS_HOST.to_string()),
            port: parsed(&var, "REDIS_PORT", DEFAULT_REDIS_PORT)?,
        };

        let search_url = match var("OPENSEARCH_URL") {
            Some(url) => url,
            None => {
                let host = var("ELASTIC_HOST").unwrap_or_else(|| DEFAULT_ELASTIC_HOST.to_string());
                let port = parsed(&var, "ELASTIC_PORT", DEFAULT_ELASTIC_PORT)?;
                if host.contains("://") {
                    format!("{host}:{port}")
                } else {
                    format!("http://{host}:{port}")
                }
            }
        };

        let state_backend = match var("ETL_STATE_BACKEND").as_deref() {
            None | Some("redis") => StateBackend::Redis,
            Some("file") => StateBackend::File(PathBuf::from(
                var("ETL_STATE_FILE").unwrap_or_else(|| DEFAULT_STATE_FILE.to_string()),
            )),
            Some(other) => {
                return Err(EtlError::config(format!(
                    "ETL_STATE_BACKEND must be 'redis' or 'file', got '{other}'"
                )))
            }
        };

        let poll_secs: u64 = parsed(&var, "ETL_POLL_INTERVAL_SECS", 60)?;
        if poll_secs == 0 {
            return Err(EtlError::config("ETL_POLL_INTERVAL_SECS must be positive"));
        }

        let batch_size: usize = parsed(&var, "ETL_BATCH_SIZE", 100)?;
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(EtlError::config(format!(
                "ETL_BATCH_SIZE must be between 1 and {MAX_BATCH_SIZE}, got {batch_size}"
            )));
        }

        let retry = RetryPolicy::new(
            Duration::from_millis(parsed(&var, "BACKOFF_START_MS", 100)?),
            parsed(&var, "BACKOFF_FACTOR", 2.0)?,
            Duration::from_millis(parsed(&var, "BACKOFF_BORDER_MS", 10_000)?),
        )
        .map_err(|e| EtlError::config(e.to_string()))?;

        Ok(Self {
            postgres,
            redis,
            search: SearchIndexConfig::new(search_url).with_max_batch_size(MAX_BATCH_SIZE),
            state_backend,
            poll_interval: Duration::from_secs(poll_secs),
            batch_size,
            retry,
        })
    }
}

fn required(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, EtlError> {
    var(key).ok_or_else(|| EtlError::config(format!("{key} is not set")))
}

fn parsed<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, EtlError>
where
    T: FromStr,
    T::Err: Display,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| EtlError::config(format!("invalid {key} '{raw}': {e}"))),
    }
}
