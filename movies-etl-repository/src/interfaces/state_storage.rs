//! Watermark storage trait definition.

use async_trait::async_trait;

use crate::errors::StateError;

/// Durable string key-value storage for per-table watermarks.
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Read the raw value stored under `key`, `None` if absent.
    async fn retrieve(&self, key: &str) -> Result<Option<String>, StateError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn save(&self, key: &str, value: &str) -> Result<(), StateError>;
}
