//! In-memory store.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::Result;

use super::KeyValueStore;

// ============================================================================
// MemoryStore
// ============================================================================

/// Process-local [`KeyValueStore`].
///
/// Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<FxHashMap<String, Value>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        store.set("a", json!(1)).await.expect("set");
        store.set("b", json!({"x": 2})).await.expect("set");

        assert_eq!(store.get("a").await.expect("get"), Some(json!(1)));
        assert_eq!(store.len(), 2);

        store.remove("a").await.expect("remove");
        store.remove("missing").await.expect("remove missing");
        assert_eq!(store.get("a").await.expect("get"), None);
        assert_eq!(store.keys().await.expect("keys"), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = MemoryStore::new();
        let clone = store.clone();
        clone.set("k", json!("v")).await.expect("set");

        assert_eq!(store.get("k").await.expect("get"), Some(json!("v")));

        store.clear().await.expect("clear");
        assert!(clone.is_empty());
    }
}
