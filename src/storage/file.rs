//! JSON file store.
//!
//! The whole table lives in memory and is rewritten to disk on every
//! change. Each write goes to a temporary file in the same directory which
//! then replaces the target, so readers never see a half-written file.

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::error::{Error, Result};

use super::KeyValueStore;

// ============================================================================
// FileStore
// ============================================================================

/// [`KeyValueStore`] persisted as one JSON object on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Target file.
    path: Arc<PathBuf>,
    /// In-memory copy of the file.
    entries: Arc<Mutex<Map<String, Value>>>,
    /// Serializes flushes so the newest table is written last.
    flush_lock: Arc<tokio::sync::Mutex<()>>,
}

impl FileStore {
    /// Opens a store, loading the file if it exists.
    ///
    /// The parent directory is created if missing.
    ///
    /// # Errors
    ///
    /// [`Error::Storage`] if the directory cannot be created or the file
    /// is not a JSON object.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                Error::storage(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let entries = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| {
                Error::storage(format!("Failed to read {}: {}", path.display(), e))
            })?;
            match serde_json::from_str::<Value>(&content) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(Error::storage(format!(
                        "{} is not a JSON object",
                        path.display()
                    )));
                }
                Err(e) => {
                    return Err(Error::storage(format!(
                        "Invalid JSON in {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        } else {
            Map::new()
        };

        debug!(path = %path.display(), entries = entries.len(), "File store opened");

        Ok(Self {
            path: Arc::new(path),
            entries: Arc::new(Mutex::new(entries)),
            flush_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Returns the backing file path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes out the table with `change` applied.
    ///
    /// The in-memory table only takes the change once the file has it.
    async fn update(&self, change: impl FnOnce(&mut Map<String, Value>)) -> Result<()> {
        let _flush = self.flush_lock.lock().await;

        let mut next = self.entries.lock().clone();
        change(&mut next);
        let content = serde_json::to_vec_pretty(&next)?;

        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || write_atomically(&path, &content))
            .await
            .map_err(|e| Error::storage(format!("Flush task failed: {e}")))??;

        *self.entries.lock() = next;

        trace!(path = %self.path.display(), "File store flushed");
        Ok(())
    }
}

/// Writes `content` to a sibling temp file, then renames it over `path`.
fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = NamedTempFile::new_in(dir).map_err(Error::Io)?;
    temp.write_all(content).map_err(Error::Io)?;
    temp.as_file().sync_all().map_err(Error::Io)?;
    temp.persist(path)
        .map_err(|e| Error::storage(format!("Failed to replace {}: {}", path.display(), e)))?;
    Ok(())
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let key = key.to_string();
        self.update(move |entries| {
            entries.insert(key, value);
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        if !self.entries.lock().contains_key(key) {
            return Ok(());
        }
        self.update(|entries| {
            entries.remove(key);
        })
        .await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }

    async fn clear(&self) -> Result<()> {
        self.update(Map::clear).await
    }
}

// ============================================================================
// Tests
// ============================================================================
