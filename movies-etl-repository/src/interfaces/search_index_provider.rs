//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (OpenSearch, Elasticsearch, etc.).

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::IndexError;
use crate::types::{BulkDocument, BulkSummary};

/// Abstracts the underlying search index implementation (OpenSearch, Elasticsearch, etc.).
///
/// All methods return `Result<T, IndexError>` for consistent error handling across
/// different backend implementations.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Insert or overwrite documents by id in a single bulk request.
    ///
    /// # Arguments
    ///
    /// * `index` - Target index name
    /// * `documents` - Documents to write
    ///
    /// # Returns
    ///
    /// * `Ok(BulkSummary)` - Per-item outcome; callers decide how to treat partial failures
    /// * `Err(IndexError)` - If the request as a whole failed
    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[BulkDocument],
    ) -> Result<BulkSummary, IndexError>;

    /// Create `index` with the given settings and mappings unless it exists.
    async fn ensure_index(&self, index: &str, body: &Value) -> Result<(), IndexError>;

    /// Check if the search engine is healthy and reachable.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the search engine is healthy
    /// * `Ok(false)` - If the search engine is unhealthy
    /// * `Err(IndexError)` - If the health check fails to execute
    async fn health_check(&self) -> Result<bool, IndexError>;
}
