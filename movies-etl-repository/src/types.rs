//! Request and response types shared by the repository interfaces.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use movies_etl_shared::{ChangeRow, IndexDocument, Watermark};

use crate::errors::IndexError;

/// Position of a keyset-paginated change scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCursor {
    /// First page: every row changed at or after the timestamp.
    Since(DateTime<Utc>),
    /// Later pages: rows strictly after `(modified, id)`.
    After { modified: DateTime<Utc>, id: Uuid },
}

impl ChangeCursor {
    /// The first page of a scan starting at `watermark`.
    pub fn from_watermark(watermark: &Watermark) -> Self {
        Self::Since(watermark.date)
    }

    /// The page following `row`.
    pub fn after(row: &ChangeRow) -> Self {
        Self::After {
            modified: row.modified,
            id: row.id,
        }
    }
}

/// A document serialized for a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkDocument {
    /// The `_id` to write.
    pub id: String,
    /// The `_source` body.
    pub source: Value,
}

impl BulkDocument {
    /// Serialize an index document.
    pub fn from_document<D: IndexDocument>(document: &D) -> Result<Self, IndexError> {
        let source = serde_json::to_value(document)
            .map_err(|e| IndexError::serialization(e.to_string()))?;
        Ok(Self {
            id: document.document_id(),
            source,
        })
    }
}

/// Result of a bulk operation for a single item.
#[derive(Debug, Clone)]
pub struct BulkItemResult {
    /// The document id.
    pub id: String,
    /// Whether the item was written.
    pub success: bool,
    /// HTTP status reported for the item.
    pub status: u16,
    /// Error reason if the item failed.
    pub error: Option<String>,
}

/// Summary of a bulk operation containing aggregate statistics and individual results.
#[derive(Debug, Clone, Default)]
pub struct BulkSummary {
    /// Total number of items in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each item.
    pub results: Vec<BulkItemResult>,
}

impl BulkSummary {
    /// Build a summary from per-item results.
    pub fn from_results(results: Vec<BulkItemResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// Whether every item was written.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// The items that failed.
    pub fn failures(&self) -> impl Iterator<Item = &BulkItemResult> {
        self.results.iter().filter(|r| !r.success)
    }
}
