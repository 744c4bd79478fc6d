//! Per-table watermark persistence.
//!
//! Watermarks are stored as JSON strings keyed by table name. Anything that
//! cannot be read back as a [`Watermark`] is treated as "never synchronized".

use std::sync::Arc;

use tracing::{debug, warn};

use movies_etl_repository::{StateError, StateStorage};
use movies_etl_shared::{SourceTable, Watermark};

use crate::errors::PipelineError;
use crate::retry::RetryPolicy;

/// Reads and writes table watermarks through a [`StateStorage`] backend.
pub struct StateStore {
    storage: Arc<dyn StateStorage>,
    retry: RetryPolicy,
}

impl StateStore {
    pub fn new(storage: Arc<dyn StateStorage>, retry: RetryPolicy) -> Self {
        Self { storage, retry }
    }

    /// The stored watermark of `table`, or the minimum if none is stored.
    pub async fn get(&self, table: SourceTable) -> Result<Watermark, PipelineError> {
        let raw = self
            .retry
            .execute("state.retrieve", || self.storage.retrieve(table.name()))
            .await?;

        let Some(raw) = raw else {
            debug!(table = %table, "No stored watermark");
            return Ok(Watermark::minimum());
        };

        match serde_json::from_str::<Watermark>(&raw) {
            Ok(watermark) => Ok(watermark),
            Err(e) => {
                warn!(
                    table = %table,
                    stored = %raw,
                    error = %e,
                    "Ignoring unreadable watermark"
                );
                Ok(Watermark::minimum())
            }
        }
    }

    /// Persist `watermark` as the new position of `table`.
    pub async fn set(&self, table: SourceTable, watermark: &Watermark) -> Result<(), PipelineError> {
        let value = serde_json::to_string(watermark)
            .map_err(|e| StateError::serialization(e.to_string()))?;

        self.retry
            .execute("state.save", || self.storage.save(table.name(), &value))
            .await?;

        debug!(table = %table, date = %watermark.date, "Stored watermark");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fast_retry, ts, InMemoryState};

    fn store(storage: &Arc<InMemoryState>) -> StateStore {
        StateStore::new(storage.clone(), fast_retry())
    }

    #[tokio::test]
    async fn test_absent_watermark_is_minimum() {
        let storage = Arc::new(InMemoryState::new());
        let watermark = store(&storage).get(SourceTable::FilmWork).await.unwrap();
        assert!(watermark.is_minimum());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let storage = Arc::new(InMemoryState::new());
        let store = store(&storage);

        store
            .set(SourceTable::Person, &Watermark::at(ts(5)))
            .await
            .unwrap();

        assert_eq!(store.get(SourceTable::Person).await.unwrap(), Watermark::at(ts(5)));
        assert!(store.get(SourceTable::Genre).await.unwrap().is_minimum());
        assert_eq!(
            storage.raw("person").as_deref(),
            Some(r#"{"date":"2024-01-01T00:05:00Z"}"#)
        );
    }

    #[tokio::test]
    async fn test_reads_legacy_naive_timestamp() {
        let storage = Arc::new(InMemoryState::new());
        storage.insert("genre", r#"{"date": "2024-01-01T00:05:00", "offset": 3}"#);

        let watermark = store(&storage).get(SourceTable::Genre).await.unwrap();
        assert_eq!(watermark.date, ts(5));
        assert_eq!(watermark.offset, Some(3));
    }

    #[tokio::test]
    async fn test_malformed_watermark_falls_back_to_minimum() {
        let storage = Arc::new(InMemoryState::new());
        storage.insert("film_work", "not json");
        storage.insert("person", r#"{"date": "yesterday"}"#);

        let store = store(&storage);
        assert!(store.get(SourceTable::FilmWork).await.unwrap().is_minimum());
        assert!(store.get(SourceTable::Person).await.unwrap().is_minimum());
    }

    #[tokio::test]
    async fn test_unreachable_store_gives_up() {
        let storage = Arc::new(InMemoryState::new());
        storage.set_failure(Some(StateError::connection("connection refused")));

        let result = store(&storage).get(SourceTable::Genre).await;
        assert!(matches!(
            result,
            Err(PipelineError::RetryExhausted { attempts: 4, .. })
        ));
    }
}
