//! Local JSON file watermark storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::StateError;
use crate::interfaces::StateStorage;

/// Stores all watermarks in one JSON object keyed by table name.
///
/// Writes merge into the existing object and replace the file through a
/// temporary sibling, so a crash mid-write leaves the previous state intact.
pub struct JsonFileStateStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStateStorage {
    /// Open (creating if missing) the state file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        if fs::metadata(&path).await.is_err() {
            fs::write(&path, b"").await?;
        }

        info!(path = %path.display(), "Using file state storage");
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    async fn read_all(&self) -> Result<Map<String, Value>, StateError> {
        let raw = fs::read_to_string(&self.path).await?;
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(StateError::serialization(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
        }
    }
}

#[async_trait]
impl StateStorage for JsonFileStateStorage {
    async fn retrieve(&self, key: &str) -> Result<Option<String>, StateError> {
        let state = self.read_all().await?;
        Ok(state.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }))
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StateError> {
        let _guard = self.write_lock.lock().await;

        let mut state = self.read_all().await?;
        state.insert(key.to_string(), Value::String(value.to_string()));

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(&Value::Object(state))?).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!(key = %key, "Saved state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStateStorage::open(dir.path().join("state.json"))
            .await
            .unwrap();

        assert_eq!(storage.retrieve("film_work").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_merges_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let storage = JsonFileStateStorage::open(&path).await.unwrap();

        storage.save("genre", r#"{"date":"2024-01-01T00:00:00Z"}"#).await.unwrap();
        storage.save("person", r#"{"date":"2024-02-01T00:00:00Z"}"#).await.unwrap();
        storage.save("genre", r#"{"date":"2024-03-01T00:00:00Z"}"#).await.unwrap();

        let reopened = JsonFileStateStorage::open(&path).await.unwrap();
        assert_eq!(
            reopened.retrieve("genre").await.unwrap().as_deref(),
            Some(r#"{"date":"2024-03-01T00:00:00Z"}"#)
        );
        assert_eq!(
            reopened.retrieve("person").await.unwrap().as_deref(),
            Some(r#"{"date":"2024-02-01T00:00:00Z"}"#)
        );
    }

    #[tokio::test]
    async fn test_reads_nested_object_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, r#"{"film_work": {"date": "2024-01-01T00:00:00Z"}}"#)
            .await
            .unwrap();

        let storage = JsonFileStateStorage::open(&path).await.unwrap();
        let value = storage.retrieve("film_work").await.unwrap().unwrap();
        let parsed: Value = serde_json::from_str(&value).unwrap();
        assert_eq!(parsed["date"], "2024-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_rejects_non_object_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, "[1, 2, 3]").await.unwrap();

        let storage = JsonFileStateStorage::open(&path).await.unwrap();
        let err = storage.retrieve("genre").await.unwrap_err();
        assert!(matches!(err, StateError::SerializationError(_)));
    }
}
