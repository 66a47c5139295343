use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use commentary_protocol::{CommentaryError, CommentaryResult, KeyValueStorePort};
use parking_lot::Mutex;
use tokio::fs;
use tracing::{debug, instrument};

/// Process-local table, used for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    items: Mutex<HashMap<String, serde_json::Value>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[async_trait]
impl KeyValueStorePort for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> CommentaryResult<Option<serde_json::Value>> {
        Ok(self.items.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, item: serde_json::Value) -> CommentaryResult<()> {
        self.items.lock().insert(key.to_owned(), item);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CommentaryResult<()> {
        self.items.lock().remove(key);
        Ok(())
    }
}

/// One pretty-printed JSON file per key under `root`.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// reader sees either the previous item or the new one.
#[derive(Debug)]
pub struct FileKeyValueStore {
    root: PathBuf,
    write_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileKeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", file_stem(key)))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.root.join(format!(".{}.json.tmp", file_stem(key)))
    }

    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut guard = self.write_locks.lock();
        guard
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn read_item(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let path = self.item_path(key);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(error).with_context(|| format!("failed reading item file {path:?}"));
            }
        };
        let item = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing item file {path:?}"))?;
        Ok(Some(item))
    }

    async fn write_item(&self, key: &str, item: &serde_json::Value) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to create table dir {:?}", self.root))?;

        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        let path = self.item_path(key);
        let temp = self.temp_path(key);
        let payload = serde_json::to_string_pretty(item).context("failed serializing item")?;
        fs::write(&temp, payload)
            .await
            .with_context(|| format!("failed writing temp file {temp:?}"))?;
        fs::rename(&temp, &path)
            .await
            .with_context(|| format!("failed replacing item file {path:?}"))?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        let path = self.item_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => {
                Err(error).with_context(|| format!("failed removing item file {path:?}"))
            }
        }
    }
}

#[async_trait]
impl KeyValueStorePort for FileKeyValueStore {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn get(&self, key: &str) -> CommentaryResult<Option<serde_json::Value>> {
        let item = self.read_item(key).await.map_err(persistence)?;
        debug!(found = item.is_some(), "item read from table");
        Ok(item)
    }

    #[instrument(skip(self, item), fields(root = %self.root.display()))]
    async fn put(&self, key: &str, item: serde_json::Value) -> CommentaryResult<()> {
        self.write_item(key, &item).await.map_err(persistence)?;
        debug!("item written to table");
        Ok(())
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn delete(&self, key: &str) -> CommentaryResult<()> {
        self.remove_item(key).await.map_err(persistence)?;
        debug!("item deleted from table");
        Ok(())
    }
}

fn persistence(error: anyhow::Error) -> CommentaryError {
    CommentaryError::Persistence(format!("{error:#}"))
}

/// Keys become file names; anything outside `[A-Za-z0-9_-]` is replaced.
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use anyhow::Result;
    use commentary_protocol::KeyValueStorePort;
    use serde_json::json;
    use tokio::fs;

    use super::*;

    fn unique_test_root(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("{name}-{nanos}"))
    }

    #[tokio::test]
    async fn in_memory_store_overwrites_and_deletes() -> Result<()> {
        let store = InMemoryKeyValueStore::new();
        assert!(store.get("latest").await?.is_none());

        store.put("latest", json!({ "id": "latest", "n": 1 })).await?;
        store.put("latest", json!({ "id": "latest", "n": 2 })).await?;
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("latest").await?.map(|item| item["n"].clone()), Some(json!(2)));

        store.delete("latest").await?;
        store.delete("latest").await?;
        assert!(store.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn file_store_round_trips_items() -> Result<()> {
        let root = unique_test_root("commentary-kv");
        let store = FileKeyValueStore::new(&root);

        assert!(store.get("latest").await?.is_none());
        store.put("latest", json!({ "id": "latest", "comment": [] })).await?;
        let item = store.get("latest").await?;
        assert_eq!(item, Some(json!({ "id": "latest", "comment": [] })));
        assert!(!fs::try_exists(root.join(".latest.json.tmp")).await?);

        store.delete("latest").await?;
        assert!(store.get("latest").await?.is_none());
        store.delete("latest").await?;

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn file_store_reports_corrupt_items() -> Result<()> {
        let root = unique_test_root("commentary-kv-corrupt");
        fs::create_dir_all(&root).await?;
        fs::write(root.join("latest.json"), "{ not json").await?;
        let store = FileKeyValueStore::new(&root);

        let error = store.get("latest").await.unwrap_err();
        assert!(matches!(error, CommentaryError::Persistence(_)));
        assert!(error.to_string().contains("failed parsing item file"));

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn file_store_propagates_read_errors() -> Result<()> {
        let root = unique_test_root("commentary-kv-unreadable");
        fs::create_dir_all(root.join("latest.json")).await?;
        let store = FileKeyValueStore::new(&root);

        let error = store.get("latest").await.unwrap_err();
        assert!(matches!(error, CommentaryError::Persistence(_)));
        assert!(error.to_string().contains("failed reading item file"));
        assert!(store.get("other").await?.is_none());

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[test]
    fn keys_are_sanitized_for_the_filesystem() {
        assert_eq!(file_stem("match/2024 final"), "match_2024_final");
        assert_eq!(file_stem("latest"), "latest");
    }
}
