//! Connection settings for the external services.

use sqlx::postgres::PgConnectOptions;

/// Connection settings for the relational source.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Schema holding the movies tables.
    pub schema: String,
}

impl PostgresConfig {
    /// Build the sqlx connect options.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

/// Connection settings for the Redis state store.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
}

impl RedisConfig {
    /// Connection URL understood by the redis client.
    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

/// Configuration for the search index client.
#[derive(Debug, Clone)]
pub struct SearchIndexConfig {
    /// Base URL of the search cluster.
    pub url: String,
    /// Maximum number of documents allowed in a single bulk request.
    /// Set to None to disable the limit (not recommended for production).
    pub max_batch_size: Option<usize>,
}

impl SearchIndexConfig {
    /// Config for `url` with the default batch limit.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_batch_size: Some(1000),
        }
    }

    /// Create a config with a custom batch size limit.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = Some(max_batch_size);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_url() {
        let config = RedisConfig {
            host: "redis".to_string(),
            port: 6379,
        };
        assert_eq!(config.url(), "redis://redis:6379/");
    }

    #[test]
    fn test_search_index_config_defaults() {
        let config = SearchIndexConfig::new("http://localhost:9200");
        assert_eq!(config.max_batch_size, Some(1000));
        assert_eq!(config.with_max_batch_size(50).max_batch_size, Some(50));
    }
}
