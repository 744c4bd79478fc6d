//! Loader module for the movies ETL pipeline.
//!
//! Bulk-upserts documents into the search indices.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use movies_etl_repository::opensearch::index_body;
use movies_etl_repository::{BulkDocument, SearchIndexProvider};
use movies_etl_shared::{IndexDocument, GENRES_INDEX, MOVIES_INDEX, PERSONS_INDEX};

use crate::errors::PipelineError;
use crate::retry::RetryPolicy;

/// Loader that writes documents into the search engine.
///
/// Each call is one bulk request. A request that fails as a whole is retried;
/// a request with rejected items fails the call, so the caller keeps its
/// watermark and the batch is rebuilt on the next cycle.
pub struct SearchLoader {
    client: Arc<dyn SearchIndexProvider>,
    retry: RetryPolicy,
}

impl SearchLoader {
    pub fn new(client: Arc<dyn SearchIndexProvider>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Upsert `documents` into `index`, returning how many were written.
    #[instrument(skip(self, documents))]
    pub async fn bulk_upsert<'d, D>(
        &self,
        index: &str,
        documents: impl IntoIterator<Item = &'d D>,
    ) -> Result<usize, PipelineError>
    where
        D: IndexDocument + 'd,
    {
        let docs: Vec<BulkDocument> = documents
            .into_iter()
            .filter_map(|doc| match BulkDocument::from_document(doc) {
                Ok(bulk) => Some(bulk),
                Err(e) => {
                    warn!(id = %doc.document_id(), error = %e, "Skipping unserializable document");
                    None
                }
            })
            .collect();

        if docs.is_empty() {
            return Ok(0);
        }

        let summary = self
            .retry
            .execute("index.bulk_upsert", || self.client.bulk_upsert(index, &docs))
            .await?;

        if !summary.all_succeeded() {
            for failure in summary.failures().take(5) {
                warn!(
                    id = %failure.id,
                    status = failure.status,
                    error = failure.error.as_deref().unwrap_or_default(),
                    "Document rejected"
                );
            }
            return Err(PipelineError::PartialBulkFailure {
                index: index.to_string(),
                failed: summary.failed,
                total: summary.total,
            });
        }

        debug!(count = summary.succeeded, "Indexed documents");
        Ok(summary.succeeded)
    }

    /// Create the movies, persons and genres indices if they do not exist.
    pub async fn ensure_indices(&self) -> Result<(), PipelineError> {
        for index in [MOVIES_INDEX, PERSONS_INDEX, GENRES_INDEX] {
            let body = index_body(index)
                .ok_or_else(|| PipelineError::config(format!("no mapping for index {index}")))?;
            self.retry
                .execute("index.ensure_index", || self.client.ensure_index(index, &body))
                .await?;
        }
        info!("Search indices ready");
        Ok(())
    }

    /// Check if the search engine is healthy, retrying while it is unreachable.
    pub async fn health_check(&self) -> Result<bool, PipelineError> {
        self.retry
            .execute("index.health_check", || self.client.health_check())
            .await
    }
}
