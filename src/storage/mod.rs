//! Persisted key-value state.
//!
//! The coordinator persists the last query, the overlay position and each
//! tab's last [`TabMatchState`](crate::session::TabMatchState) so a restarted
//! coordinator can pick the session back up.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`KeyValueStore`] | Async get/set seam over JSON values |
//! | [`MemoryStore`] | Process-local store |
//! | [`FileStore`] | JSON file, rewritten atomically on every change |
//!
//! Keys are named in [`keys`].

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Submodules
// ============================================================================

/// JSON file store.
pub mod file;

/// In-memory store.
pub mod memory;

// ============================================================================
// Re-exports
// ============================================================================

pub use file::FileStore;
pub use memory::MemoryStore;

// ============================================================================
// KeyValueStore
// ============================================================================

/// Async key-value persistence over JSON values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a value.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Writes a value, replacing any previous one.
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Removes a value. Missing keys are not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Lists every key.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Removes every value.
    async fn clear(&self) -> Result<()>;
}

// ============================================================================
// Typed Helpers
// ============================================================================

/// Reads and deserializes a value.
///
/// # Errors
///
/// Store failures, or [`Error::Storage`] if the stored value has the wrong shape.
pub async fn load<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| Error::storage(format!("{key}: {e}"))),
        None => Ok(None),
    }
}

/// Serializes and writes a value.
///
/// # Errors
///
/// Store failures or a serialization error.
pub async fn save<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    store.set(key, serde_json::to_value(value)?).await
}

// ============================================================================
// Keys
// ============================================================================

/// Persisted key names.
pub mod keys {
    use crate::identifiers::TabId;

    /// Last committed query.
    pub const LAST_QUERY: &str = "lastQuery";

    /// Overlay position.
    pub const LAYOVER_POSITION: &str = "layoverPosition";

    /// Epoch of the persisted session.
    pub const EPOCH: &str = "epoch";

    /// Highest transaction id issued so far.
    pub const LAST_TRANSACTION: &str = "lastTransactionId";

    /// Prefix of per-tab state keys.
    const TAB_STATE_PREFIX: &str = "tab:";

    /// Key of one tab's state.
    #[inline]
    #[must_use]
    pub fn tab_state(tab_id: TabId) -> String {
        format!("{TAB_STATE_PREFIX}{tab_id}")
    }

    /// Tab id of a per-tab state key.
    #[must_use]
    pub fn parse_tab_state(key: &str) -> Option<TabId> {
        key.strip_prefix(TAB_STATE_PREFIX)?
            .parse::<u32>()
            .ok()
            .and_then(TabId::new)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::identifiers::TabId;
    use crate::session::LayoverPosition;

    #[test]
    fn test_tab_state_keys() {
        let tab_id = TabId::new(42).expect("valid tab id");
        let key = keys::tab_state(tab_id);

        assert_eq!(key, "tab:42");
        assert_eq!(keys::parse_tab_state(&key), Some(tab_id));
        assert_eq!(keys::parse_tab_state("tab:0"), None);
        assert_eq!(keys::parse_tab_state("tab:x"), None);
        assert_eq!(keys::parse_tab_state(keys::LAST_QUERY), None);
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        let store = MemoryStore::new();
        let position = LayoverPosition { x: 3, y: -4 };

        save(&store, keys::LAYOVER_POSITION, &position)
            .await
            .expect("save");
        let loaded: Option<LayoverPosition> = load(&store, keys::LAYOVER_POSITION)
            .await
            .expect("load");
        assert_eq!(loaded, Some(position));

        let missing: Option<String> = load(&store, keys::LAST_QUERY).await.expect("load");
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_load_wrong_shape_is_storage_error() {
        let store = MemoryStore::new();
        store
            .set(keys::LAYOVER_POSITION, Value::from("not a position"))
            .await
            .expect("set");

        let result: Result<Option<LayoverPosition>> = load(&store, keys::LAYOVER_POSITION).await;
        assert!(matches!(result, Err(Error::Storage { .. })));
    }
}
