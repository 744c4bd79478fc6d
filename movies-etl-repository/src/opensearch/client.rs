//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::{
        request::JsonBody,
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    indices::{IndicesCreateParts, IndicesExistsParts},
    BulkParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::SearchIndexConfig;
use crate::errors::IndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{BulkDocument, BulkItemResult, BulkSummary};

/// OpenSearch client implementation.
///
/// # Example
///
/// ```ignore
/// let client = OpenSearchClient::new(&SearchIndexConfig::new("http://localhost:9200"))?;
/// let docs = vec![BulkDocument::from_document(&film)?];
/// let summary = client.bulk_upsert("movies", &docs).await?;
/// assert!(summary.all_succeeded());
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    config: SearchIndexConfig,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client for the configured URL.
    ///
    /// No request is made; use [`SearchIndexProvider::health_check`] to verify
    /// connectivity.
    pub fn new(config: &SearchIndexConfig) -> Result<Self, IndexError> {
        let parsed_url =
            Url::parse(&config.url).map_err(|e| IndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| IndexError::connection(e.to_string()))?;

        info!(url = %config.url, "Created OpenSearch client");

        Ok(Self {
            client: OpenSearch::new(transport),
            config: config.clone(),
        })
    }

    /// Check if batch size exceeds the configured limit.
    fn validate_batch_size(&self, size: usize) -> Result<(), IndexError> {
        if let Some(max) = self.config.max_batch_size {
            if size > max {
                return Err(IndexError::batch_size_exceeded(size, max));
            }
        }
        Ok(())
    }

    /// Build the NDJSON body of a bulk request: an `index` action per document
    /// followed by its source.
    fn bulk_body(documents: &[BulkDocument]) -> Vec<JsonBody<Value>> {
        let mut body = Vec::with_capacity(documents.len() * 2);
        for doc in documents {
            body.push(JsonBody::new(json!({ "index": { "_id": doc.id } })));
            body.push(JsonBody::new(doc.source.clone()));
        }
        body
    }

    /// Turn a non-success response into an error, reading its body for context.
    async fn status_error(response: Response) -> IndexError {
        let status = response.status_code().as_u16();
        let body = response.text().await.unwrap_or_default();
        IndexError::from_status(status, body)
    }

    /// Parse the per-item results of a bulk response.
    ///
    /// Items are matched by their `_id`; any item without a 2xx status is a failure.
    pub(crate) fn parse_bulk_response(body: &Value) -> Result<BulkSummary, IndexError> {
        let items = body["items"]
            .as_array()
            .ok_or_else(|| IndexError::parse("bulk response has no items array"))?;

        let results = items
            .iter()
            .map(|item| {
                let action = item
                    .as_object()
                    .and_then(|obj| obj.values().next())
                    .cloned()
                    .unwrap_or(Value::Null);

                let status = action["status"].as_u64().unwrap_or(0) as u16;
                let success = (200..300).contains(&status);
                let error = if success {
                    None
                } else {
                    Some(
                        action["error"]["reason"]
                            .as_str()
                            .map(str::to_string)
                            .unwrap_or_else(|| action["error"].to_string()),
                    )
                };

                BulkItemResult {
                    id: action["_id"].as_str().unwrap_or_default().to_string(),
                    success,
                    status,
                    error,
                }
            })
            .collect();

        Ok(BulkSummary::from_results(results))
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchClient {
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[BulkDocument],
    ) -> Result<BulkSummary, IndexError> {
        if documents.is_empty() {
            return Ok(BulkSummary::default());
        }
        self.validate_batch_size(documents.len())?;

        let response = self
            .client
            .bulk(BulkParts::Index(index))
            .body(Self::bulk_body(documents))
            .send()
            .await
            .map_err(|e| IndexError::connection(e.to_string()))?;

        if !response.status_code().is_success() {
            let err = Self::status_error(response).await;
            error!(error = %err, "Bulk request failed");
            return Err(err);
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| IndexError::parse(e.to_string()))?;

        let summary = Self::parse_bulk_response(&body)?;
        if summary.all_succeeded() {
            debug!(succeeded = summary.succeeded, "Bulk request completed");
        } else {
            warn!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Bulk request reported item failures"
            );
        }

        Ok(summary)
    }

    async fn ensure_index(&self, index: &str, body: &Value) -> Result<(), IndexError> {
        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| IndexError::connection(e.to_string()))?;

        match exists.status_code().as_u16() {
            200 => {
                debug!(index = %index, "Index already exists");
                return Ok(());
            }
            404 => {}
            _ => return Err(Self::status_error(exists).await),
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(body.clone())
            .send()
            .await
            .map_err(|e| IndexError::connection(e.to_string()))?;

        if !response.status_code().is_success() {
            let status = response.status_code().as_u16();
            let text = response.text().await.unwrap_or_default();
            // Another writer may have created it between the two calls.
            if text.contains("resource_already_exists_exception") {
                return Ok(());
            }
            return Err(match IndexError::from_status(status, text) {
                err @ IndexError::Unavailable { .. } => err,
                other => IndexError::index_creation(other.to_string()),
            });
        }

        info!(index = %index, "Created index");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, IndexError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| IndexError::connection(e.to_string()))?;

        if !response.status_code().is_success() {
            return Ok(false);
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| IndexError::parse(e.to_string()))?;

        Ok(body["status"].as_str().map_or(false, |status| status != "red"))
    }
}
